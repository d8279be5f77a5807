// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
// self
use crate::{_prelude::*, obs::OpKind};

/// Span wrapper used by relay operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	span: Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("eventsub_relay.op", op = kind.as_str(), stage) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}

	/// Runs a synchronous section inside the span.
	pub fn in_scope<F, T>(&self, f: F) -> T
	where
		F: FnOnce() -> T,
	{
		self.span.in_scope(f)
	}
}

/// Installs the global subscriber: `RUST_LOG` filtering (default `info`) and a compact
/// formatter.
///
/// Calling it twice is harmless; the second installation attempt is ignored.
pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(true))
		.try_init();
}
