use serde::Serialize;

use crate::providers::ProviderRegistry;

/// Configuration status of one provider adapter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: String,
    pub configured: bool,
    pub description: String,
}

pub fn source_statuses(registry: &ProviderRegistry) -> Vec<SourceStatus> {
    registry
        .providers()
        .map(|p| SourceStatus {
            name: p.source().to_string(),
            configured: p.is_configured(),
            description: p.description().to_string(),
        })
        .collect()
}

pub fn list_sources(registry: &ProviderRegistry) {
    println!("{:<12} {:<16} DESCRIPTION", "SOURCE", "STATUS");
    for status in source_statuses(registry) {
        let label = if status.configured {
            "OK"
        } else {
            "NO API KEY"
        };
        println!("{:<12} {:<16} {}", status.name, label, status.description);
    }
}
