use apkmeta::cli::Cli;

fn main() {
    env_logger::init();

    if let Err(e) = Cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
