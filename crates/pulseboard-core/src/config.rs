use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interest::{default_specs, InterestCategories, InterestCategorySpec};
use crate::scoring::KpiTargets;

const DEFAULT_PRODUCT_URL_CATEGORY: &str = "products";
const DEFAULT_TOP_N: usize = 10;

/// On-disk form of [`DashboardConfig`]. Every field is optional.
///
/// ```json
/// {
///   "targets": { "total_visits": { "daily": 40, "monthly": 1200 } },
///   "interests": [ { "label": "Chatbots", "contains": ["chat bot"] } ],
///   "product_url_category": "products",
///   "top_n": 10
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfigFile {
    #[serde(default)]
    pub targets: KpiTargets,
    #[serde(default = "default_specs")]
    pub interests: Vec<InterestCategorySpec>,
    #[serde(default = "default_product_url_category")]
    pub product_url_category: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_product_url_category() -> String {
    DEFAULT_PRODUCT_URL_CATEGORY.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

/// Validated settings for dashboard assembly.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub targets: KpiTargets,
    pub interests: InterestCategories,
    /// `url_category` value that marks a product page view.
    pub product_url_category: String,
    /// Row limit for the top-products and channel charts.
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            targets: KpiTargets::default(),
            interests: InterestCategories::default(),
            product_url_category: default_product_url_category(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl DashboardConfig {
    pub fn from_file_config(file: DashboardConfigFile) -> Result<Self> {
        file.targets.validate()?;
        Ok(Self {
            interests: InterestCategories::from_specs(&file.interests)?,
            targets: file.targets,
            product_url_category: file.product_url_category,
            top_n: file.top_n,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_file_config(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_file_config(serde_json::from_reader(reader)?)
    }
}
