//! Opcode-keyed handler registry for inbound requests and notifications.

use crate::error::{Result, WireError};
use crate::protocol::message::Message;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::RwLock;

type HandlerFn = dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static;

/// Routes requests to handlers by opcode.
///
/// Handlers receive the raw request payload and return the response payload;
/// a handler error travels back to the caller as an Error message. Static
/// opcodes route without allocation via `Cow::Borrowed` keys.
pub struct Dispatcher {
    handlers: RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for `opcode`, replacing any previous one.
    pub fn register<F>(&self, opcode: impl Into<Cow<'static, str>>, handler: F) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| WireError::LockPoisoned)?;
        handlers.insert(opcode.into(), Box::new(handler));
        Ok(())
    }

    /// Run the handler for a Request or Notify message.
    pub fn dispatch(&self, msg: &Message) -> Result<Vec<u8>> {
        let (opcode, payload) = match msg {
            Message::Request {
                opcode, payload, ..
            }
            | Message::Notify { opcode, payload } => (opcode.as_str(), payload),
            _ => return Err(WireError::UnknownOpcode(String::from("<non-routable>"))),
        };

        let handlers = self.handlers.read().map_err(|_| WireError::LockPoisoned)?;
        let handler = handlers
            .get(opcode)
            .ok_or_else(|| WireError::UnknownOpcode(opcode.to_string()))?;
        handler(payload)
    }

    pub fn registered(&self, opcode: &str) -> bool {
        self.handlers
            .read()
            .map(|h| h.contains_key(opcode))
            .unwrap_or(false)
    }
}
