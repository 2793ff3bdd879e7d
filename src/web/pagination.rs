use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pagination {
    #[serde(default = "default_index")]
    pub index: u64,
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_index() -> u64 {
    1
}

fn default_size() -> u64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self { index: default_index(), size: default_size() }
    }
}

impl Pagination {
    /// Saturates, so a huge `index` just lands past the last row.
    pub fn offset(&self) -> u64 {
        self.index.saturating_sub(1).saturating_mul(self.size)
    }

    pub fn limit(&self) -> u64 {
        self.size
    }

    /// Falls back to the default page on zero values and caps the page size.
    pub fn check(&self) -> Self {
        if self.index < 1 || self.size < 1 {
            return Self::default();
        }
        Self { index: self.index, size: self.size.min(MAX_PAGE_SIZE) }
    }
}
