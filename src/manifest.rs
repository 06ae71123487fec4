use crate::{ATTR_LABEL, ATTR_MIN_SDK_VERSION, ATTR_VERSION_CODE, ATTR_VERSION_NAME};
use crate::{ApkMetadata, Attribute, AttributeValue, AxmlDocument, MetadataField, StartElement, XmlEvent};

/// Whether the manifest supplied a value for a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldState {
    /// The attribute does not appear in the manifest
    #[default]
    Absent,
    Resolved,
    /// The attribute is present but its value could not be turned into a literal
    Unresolved,
}

/// Metadata recovered by strict decoding, with per-field state
#[derive(Debug, Clone, Default)]
pub struct ManifestProjection {
    pub metadata: ApkMetadata,
    /// Resource id of `android:label` when it points into the resource table
    pub label_reference: Option<u32>,
    states: [FieldState; MetadataField::ALL.len()],
}

impl ManifestProjection {
    pub fn state(&self, field: MetadataField) -> FieldState {
        self.states[field.index()]
    }
}

enum Resolution<T> {
    Found(T),
    Unresolved(Option<u32>),
}

/// Projects a decoded document onto the manifest fields
pub struct ManifestProjector<'d> {
    document: &'d AxmlDocument,
    open: Vec<&'d str>,
    projection: ManifestProjection,
}

impl<'d> ManifestProjector<'d> {
    pub fn project(document: &'d AxmlDocument) -> ManifestProjection {
        let mut projector = Self {
            document,
            open: Vec::new(),
            projection: ManifestProjection::default(),
        };

        for event in &document.events {
            match event {
                XmlEvent::ElementStart(element) => {
                    let name = document.element_name(element).unwrap_or_default();
                    match (projector.open.last().copied(), name) {
                        (None, "manifest") => projector.project_manifest(element),
                        (Some("manifest"), "application") => projector.project_application(element),
                        (Some("manifest"), "uses-sdk") => projector.project_uses_sdk(element),
                        _ => {}
                    }
                    projector.open.push(name);
                }
                XmlEvent::ElementEnd { .. } => {
                    projector.open.pop();
                }
                _ => {}
            }
        }

        projector.projection
    }

    fn project_manifest(&mut self, element: &StartElement) {
        if let Some(attr) = self.find(element, "package", None) {
            let value = self.resolve_text(attr);
            self.record_text(MetadataField::PackageName, value);
        }
        if let Some(attr) = self.find(element, "versionName", Some(ATTR_VERSION_NAME)) {
            let value = self.resolve_text(attr);
            self.record_text(MetadataField::VersionName, value);
        }
        if let Some(attr) = self.find(element, "versionCode", Some(ATTR_VERSION_CODE)) {
            let value = self.resolve_number(attr);
            self.record_number(MetadataField::VersionCode, value);
        }
        // some encoders hoist it onto <manifest>
        if let Some(attr) = self.find(element, "minSdkVersion", Some(ATTR_MIN_SDK_VERSION)) {
            let value = self.resolve_number(attr);
            self.record_number(MetadataField::MinSdkVersion, value);
        }
    }

    fn project_application(&mut self, element: &StartElement) {
        if let Some(attr) = self.find(element, "label", Some(ATTR_LABEL)) {
            let value = self.resolve_text(attr);
            self.record_text(MetadataField::AppName, value);
        }
    }

    fn project_uses_sdk(&mut self, element: &StartElement) {
        if let Some(attr) = self.find(element, "minSdkVersion", Some(ATTR_MIN_SDK_VERSION)) {
            let value = self.resolve_number(attr);
            self.record_number(MetadataField::MinSdkVersion, value);
        }
    }

    /// Match by local name, or by framework resource id when names are obfuscated
    fn find<'e>(
        &self,
        element: &'e StartElement,
        name: &str,
        resource_id: Option<u32>,
    ) -> Option<&'e Attribute> {
        element.attributes.iter().find(|attr| {
            self.document.attribute_name(attr) == Some(name)
                || (resource_id.is_some() && self.document.attribute_resource_id(attr) == resource_id)
        })
    }

    fn resolve_text(&self, attr: &Attribute) -> Resolution<String> {
        let text = match attr.value {
            AttributeValue::StringRef(_) | AttributeValue::Null => {
                self.document.attribute_string(attr).map(str::to_string)
            }
            AttributeValue::Reference(id) => return Resolution::Unresolved(Some(id)),
            AttributeValue::IntDecimal(value) => Some(value.to_string()),
            AttributeValue::IntHex(value) => Some(value.to_string()),
            AttributeValue::Float(value) => Some(value.to_string()),
            AttributeValue::IntBoolean(value) => Some(value.to_string()),
        };

        match text {
            // "@string/app_name" left as a literal is still a reference
            Some(text) if !text.trim().is_empty() && !text.starts_with('@') => {
                Resolution::Found(text.trim().to_string())
            }
            _ => Resolution::Unresolved(None),
        }
    }

    fn resolve_number(&self, attr: &Attribute) -> Resolution<u32> {
        match attr.value {
            AttributeValue::IntDecimal(value) => u32::try_from(value)
                .map(Resolution::Found)
                .unwrap_or(Resolution::Unresolved(None)),
            AttributeValue::IntHex(value) => Resolution::Found(value),
            AttributeValue::Reference(id) => Resolution::Unresolved(Some(id)),
            _ => self
                .document
                .attribute_string(attr)
                .and_then(|text| text.trim().parse().ok())
                .map(Resolution::Found)
                .unwrap_or(Resolution::Unresolved(None)),
        }
    }

    fn record_text(&mut self, field: MetadataField, value: Resolution<String>) {
        if self.projection.state(field) == FieldState::Resolved {
            return;
        }
        match value {
            Resolution::Found(text) => {
                if let Some(slot) = self.projection.metadata.text_mut(field) {
                    *slot = Some(text);
                    self.projection.states[field.index()] = FieldState::Resolved;
                }
            }
            Resolution::Unresolved(reference) => self.mark_unresolved(field, reference),
        }
    }

    fn record_number(&mut self, field: MetadataField, value: Resolution<u32>) {
        if self.projection.state(field) == FieldState::Resolved {
            return;
        }
        match value {
            Resolution::Found(number) => {
                if let Some(slot) = self.projection.metadata.number_mut(field) {
                    *slot = Some(number);
                    self.projection.states[field.index()] = FieldState::Resolved;
                }
            }
            Resolution::Unresolved(reference) => self.mark_unresolved(field, reference),
        }
    }

    fn mark_unresolved(&mut self, field: MetadataField, reference: Option<u32>) {
        self.projection.states[field.index()] = FieldState::Unresolved;
        if field == MetadataField::AppName && self.projection.label_reference.is_none() {
            self.projection.label_reference = reference;
        }
    }
}
