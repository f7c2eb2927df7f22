//! Built-in source adapters.
//!
//! Each adapter module implements [`sessionhub_core::Store`] over one tool's
//! on-disk session layout, and exposes a [`StoreFactory`] so discovery can
//! probe for it.

pub mod claude;
pub mod codex;
mod jsonl;

pub use claude::{ClaudeFactory, ClaudeStore};
pub use codex::{CodexFactory, CodexStore};
pub use jsonl::LineReader;

use sessionhub_core::{Discovery, StoreFactory};

/// One factory per built-in adapter, in registration order.
pub fn all_factories() -> Vec<Box<dyn StoreFactory>> {
    vec![
        Box::new(ClaudeFactory),
        Box::new(CodexFactory),
    ]
}

/// Discovery preloaded with every built-in factory.
pub fn default_discovery() -> Discovery {
    let mut discovery = Discovery::new();
    for factory in all_factories() {
        discovery.register(factory);
    }
    discovery
}

/// Best-effort host name, used in workspace identity when no stronger
/// device ID exists.
pub(crate) fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}
