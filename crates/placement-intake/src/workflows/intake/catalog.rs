use std::collections::HashSet;

use super::domain::Site;

/// Immutable, ordered set of placement sites available for ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCatalog {
    sites: Vec<Site>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("site catalog must contain at least one site")]
    Empty,
    #[error("site '{0}' appears more than once in the catalog")]
    Duplicate(String),
}

impl SiteCatalog {
    /// Build a catalog from display names. Blank names are dropped; surrounding whitespace is
    /// trimmed before duplicates are detected.
    pub fn new<I, S>(names: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut sites = Vec::new();

        for name in names {
            let trimmed = name.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(CatalogError::Duplicate(trimmed.to_string()));
            }
            sites.push(Site::new(trimmed));
        }

        if sites.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self { sites })
    }

    pub fn standard() -> Self {
        Self {
            sites: standard_site_names().iter().map(|name| Site::new(*name)).collect(),
        }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn contains(&self, site: &Site) -> bool {
        self.sites.contains(site)
    }

    pub fn find(&self, name: &str) -> Option<&Site> {
        let trimmed = name.trim();
        self.sites.iter().find(|site| site.name() == trimmed)
    }
}

impl Default for SiteCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_site_names() -> &'static [&'static str] {
    &[
        "Ziv Medical Center",
        "Kiryat Shmona Welfare Services",
        "Senior Day Center",
        "Safed Youth Club",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_drops_blank_names() {
        let catalog = SiteCatalog::new([" Alpha ", "", "Beta", "   "]).expect("valid catalog");
        let names: Vec<&str> = catalog.sites().iter().map(Site::name).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
        assert!(catalog.find("  Beta").is_some());
    }

    #[test]
    fn new_rejects_duplicates_and_empty_lists() {
        assert_eq!(
            SiteCatalog::new(["Alpha", "Alpha "]),
            Err(CatalogError::Duplicate("Alpha".to_string()))
        );
        assert_eq!(
            SiteCatalog::new(Vec::<String>::new()),
            Err(CatalogError::Empty)
        );
    }
}
