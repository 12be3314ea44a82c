use ahash::AHashMap;

/// Field names the stitcher reads from collection entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchConfig {
    pub entry_field: String,
    pub full_url_field: String,
    pub resource_field: String,
    pub request_field: String,
    pub url_field: String,
    /// Give identity-less entry records the URN of their request url.
    pub adopt_urn_identities: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            entry_field: "entry".to_string(),
            full_url_field: "fullUrl".to_string(),
            resource_field: "resource".to_string(),
            request_field: "request".to_string(),
            url_field: "url".to_string(),
            adopt_urn_identities: true,
        }
    }
}

impl StitchConfig {
    pub fn with_entry_field(mut self, name: impl Into<String>) -> Self {
        self.entry_field = name.into();
        self
    }

    pub fn with_full_url_field(mut self, name: impl Into<String>) -> Self {
        self.full_url_field = name.into();
        self
    }

    pub fn with_resource_field(mut self, name: impl Into<String>) -> Self {
        self.resource_field = name.into();
        self
    }

    pub fn with_adopt_urn_identities(mut self, adopt: bool) -> Self {
        self.adopt_urn_identities = adopt;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Profile url to the more specific record type it implies.
    pub profile_overrides: AHashMap<String, String>,
    pub stitch: StitchConfig,
    /// Run the stitcher when the outermost record is a collection.
    pub stitch_collections: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            profile_overrides: AHashMap::new(),
            stitch: StitchConfig::default(),
            stitch_collections: true,
        }
    }
}

impl ParserConfig {
    pub fn with_profile_override(
        mut self,
        profile: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.profile_overrides
            .insert(profile.into(), type_name.into());
        self
    }

    pub fn with_stitch(mut self, stitch: StitchConfig) -> Self {
        self.stitch = stitch;
        self
    }

    pub fn with_stitch_collections(mut self, enabled: bool) -> Self {
        self.stitch_collections = enabled;
        self
    }

    pub fn type_for_profile(&self, profile: &str) -> Option<&str> {
        self.profile_overrides.get(profile).map(String::as_str)
    }
}
