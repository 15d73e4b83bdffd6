//! Middleware chain execution.
//!
//! The chain is a slice of molecules walked front to back. Each middleware
//! gets a `Next` pointing at the remainder of the slice; the empty remainder
//! calls the terminal handler.

use super::definitions::Molecule;
use super::registry::MiddlewareRegistry;
use crate::error::Result;
use crate::http::{Request, Response};

/// Terminal step of a chain, normally the route handler.
pub type Terminal<'a> = dyn Fn(Request) -> Result<Response> + 'a;

/// Continuation handed to a middleware.
pub struct Next<'a> {
    chain: &'a [Molecule],
    registry: &'a MiddlewareRegistry,
    terminal: &'a Terminal<'a>,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Molecule], registry: &'a MiddlewareRegistry, terminal: &'a Terminal<'a>) -> Self {
        Self {
            chain,
            registry,
            terminal,
        }
    }

    /// Molecules still to run after this point.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Continue with the rest of the chain.
    pub fn run(self, request: Request) -> Result<Response> {
        let Some((top, rest)) = self.chain.split_first() else {
            return (self.terminal)(request);
        };

        let middleware = self.registry.make(&top.class)?;
        tracing::trace!(middleware = %top.class, remaining = rest.len(), "Entering middleware");

        let next = Next {
            chain: rest,
            registry: self.registry,
            terminal: self.terminal,
        };
        middleware.handle(request, next, &top.args)
    }
}

/// Run `chain` around `terminal`.
pub fn execute_middleware(
    chain: &[Molecule],
    registry: &MiddlewareRegistry,
    request: Request,
    terminal: &Terminal<'_>,
) -> Result<Response> {
    Next::new(chain, registry, terminal).run(request)
}
