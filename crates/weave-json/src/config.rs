/// Member names that carry structure rather than fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Names the record type of an object. Objects carrying it become records.
    pub record_type_key: String,
    /// Array of comment strings attached to the enclosing value.
    pub comments_key: String,
    pub extension_key: String,
    pub modifier_extension_key: String,
    /// Member of an extension object holding its url.
    pub url_key: String,
    pub id_key: String,
    /// Marks the companion member that carries identity and extensions of a
    /// primitive, e.g. `_birthDate` next to `birthDate`.
    pub companion_prefix: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_type_key: "resourceType".to_string(),
            comments_key: "fhir_comments".to_string(),
            extension_key: "extension".to_string(),
            modifier_extension_key: "modifierExtension".to_string(),
            url_key: "url".to_string(),
            id_key: "id".to_string(),
            companion_prefix: '_',
        }
    }
}
