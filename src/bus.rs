//! Command bus - named handlers page components register for voice commands

use std::collections::HashMap;

type Handler = Box<dyn FnMut(&str) -> bool + Send>;

/// Registry mapping command names to handlers.
///
/// A handler receives the spoken argument and returns whether it acted on it.
#[derive(Default)]
pub struct CommandBus {
    handlers: HashMap<String, Handler>,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        if self
            .handlers
            .insert(name.to_lowercase(), Box::new(handler))
            .is_some()
        {
            tracing::debug!(command = name, "Replaced command handler");
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(&name.to_lowercase()).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    /// `None` if nothing is registered under `name`
    pub fn dispatch(&mut self, name: &str, argument: &str) -> Option<bool> {
        let handler = self.handlers.get_mut(&name.to_lowercase())?;
        Some(handler(argument))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("handlers", &self.names())
            .finish()
    }
}
