use rand::Rng;
use serde::{Deserialize, Serialize};

/// Names used when none are configured.
pub const DEFAULT_NAMES: [&str; 3] = ["zhu", "bin", "hua"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloReply {
    pub message: String,
}

/// Produces one request payload per call.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    names: Vec<String>,
}

impl RequestFactory {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Picks a random name from the catalog.
    ///
    /// The last entry is never picked unless it is the only one.
    pub fn make(&self) -> HelloRequest {
        let name = match self.names.len() {
            0 => String::new(),
            1 => self.names[0].clone(),
            len => {
                let idx = rand::thread_rng().gen_range(0..len - 1);
                self.names[idx].clone()
            }
        };

        HelloRequest { name }
    }
}

impl Default for RequestFactory {
    fn default() -> Self {
        Self::new(DEFAULT_NAMES.iter().map(|v| v.to_string()).collect())
    }
}
