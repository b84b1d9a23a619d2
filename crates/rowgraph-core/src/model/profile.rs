use crate::model::attribute::FetchStyle;

///
/// FetchProfile
///
/// Named set of fetch overrides that a query may enable. An enabled profile
/// upgrades the listed associations to immediate fetching with the given
/// style; an entity graph applied to the same query takes precedence.
///

#[derive(Clone, Debug)]
pub struct FetchProfile {
    pub name: String,
    pub fetches: Vec<ProfileFetch>,
}

impl FetchProfile {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fetches: Vec::new(),
        }
    }

    #[must_use]
    pub fn fetch(
        mut self,
        entity: impl Into<String>,
        attribute: impl Into<String>,
        style: FetchStyle,
    ) -> Self {
        self.fetches.push(ProfileFetch {
            entity: entity.into(),
            attribute: attribute.into(),
            style,
        });
        self
    }

    /// Override for one association role, if this profile names it.
    #[must_use]
    pub fn style_for(&self, entity: &str, attribute: &str) -> Option<FetchStyle> {
        self.fetches
            .iter()
            .find(|f| f.entity == entity && f.attribute == attribute)
            .map(|f| f.style)
    }
}

///
/// ProfileFetch
///

#[derive(Clone, Debug)]
pub struct ProfileFetch {
    pub entity: String,
    pub attribute: String,
    pub style: FetchStyle,
}
