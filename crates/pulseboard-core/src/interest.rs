//! Configurable classification of page names into solution-interest
//! categories.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Config form of a category: lowercase substrings and/or regex patterns,
/// all matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestCategorySpec {
    pub label: String,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum PageMatcher {
    Contains(String),
    Pattern(Regex),
}

impl PageMatcher {
    /// `page_lower` must already be lowercased.
    pub fn matches(&self, page_lower: &str) -> bool {
        match self {
            PageMatcher::Contains(needle) => page_lower.contains(needle.as_str()),
            PageMatcher::Pattern(re) => re.is_match(page_lower),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterestCategory {
    pub label: String,
    pub matchers: Vec<PageMatcher>,
}

impl InterestCategory {
    pub fn from_spec(spec: &InterestCategorySpec) -> Result<Self> {
        let mut matchers = Vec::with_capacity(spec.contains.len() + spec.patterns.len());
        for needle in &spec.contains {
            matchers.push(PageMatcher::Contains(needle.to_lowercase()));
        }
        for pattern in &spec.patterns {
            let re = Regex::new(&format!("(?i){pattern}")).map_err(|e| {
                CoreError::InvalidConfig(format!(
                    "interest category `{}`: bad pattern `{pattern}`: {e}",
                    spec.label
                ))
            })?;
            matchers.push(PageMatcher::Pattern(re));
        }
        if matchers.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "interest category `{}` has no matchers",
                spec.label
            )));
        }
        Ok(Self {
            label: spec.label.clone(),
            matchers,
        })
    }

    pub fn matches(&self, page_lower: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(page_lower))
    }
}

/// Ordered set of categories. Order is the display order.
#[derive(Debug, Clone)]
pub struct InterestCategories {
    categories: Vec<InterestCategory>,
}

impl InterestCategories {
    pub fn from_specs(specs: &[InterestCategorySpec]) -> Result<Self> {
        let categories = specs
            .iter()
            .map(InterestCategory::from_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { categories })
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterestCategory> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for InterestCategories {
    fn default() -> Self {
        Self {
            categories: default_specs()
                .iter()
                .map(|spec| InterestCategory {
                    label: spec.label.clone(),
                    matchers: spec
                        .contains
                        .iter()
                        .map(|c| PageMatcher::Contains(c.clone()))
                        .collect(),
                })
                .collect(),
        }
    }
}

fn spec(label: &str, contains: &[&str]) -> InterestCategorySpec {
    InterestCategorySpec {
        label: label.to_string(),
        contains: contains.iter().map(|c| c.to_string()).collect(),
        patterns: Vec::new(),
    }
}

/// The solution catalogue the dashboard ships with.
pub fn default_specs() -> Vec<InterestCategorySpec> {
    vec![
        spec("AI Assistant", &["virtual assistant"]),
        spec(
            "Prototyping Tools",
            &["ui/ux design generator", "prototyping tool"],
        ),
        spec("Sales & CRM Optimization", &["sales & crm optimization"]),
        spec("HR & Recruitment Tool", &["hr & recruitment tool"]),
        spec("Document Processor License", &["document processor license"]),
        spec(
            "Predictive Analytics Platform",
            &["predictive analytics platform"],
        ),
        spec("Software Testing Tool", &["software testing tool"]),
    ]
}
