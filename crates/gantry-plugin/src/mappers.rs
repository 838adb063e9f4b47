//! Standard converters every component call carries.
//!
//! These bridge the wire-friendly scalars a host can actually send (broker
//! stream ids) to the rich handles plugin operations want to take as
//! parameters. Because they are converters, an operation that declares a
//! [`UiHandle`] or [`LogBatchWriter`] parameter automatically advertises
//! the underlying stream-id argument in its funcspec, and the solver's
//! func-once discipline guarantees each sub-stream is dialed exactly once
//! per call.

use std::sync::Arc;

use gantry_funcspec::{ArgClass, FuncDef, ParamSpec, TypedValue, ValueKey};
use gantry_proto::PrimitiveKind;

use crate::args::Internal;
use crate::logviewer::LogBatchWriter;
use crate::terminal::{RemoteTerminal, UiHandle};

/// Named slot carrying the terminal UI sub-stream id.
pub const TERMINAL_STREAM_ARG: &str = "tui_stream_id";

/// Named slot carrying the log viewer sub-stream id.
pub const LOG_STREAM_ARG: &str = "log_stream_id";

/// Returns the converters injected into every component call.
#[must_use]
pub fn standard_mappers() -> Vec<FuncDef> {
    vec![terminal_ui_mapper(), log_writer_mapper()]
}

/// Builds a [`UiHandle`] from the host-advertised terminal stream id.
fn terminal_ui_mapper() -> FuncDef {
    let stream_key = ValueKey::typed::<u64>().with_name(TERMINAL_STREAM_ARG);
    let extract_key = stream_key.clone();
    FuncDef::raw(
        "terminal_ui_from_stream",
        vec![
            ParamSpec::new(stream_key, ArgClass::Primitive(PrimitiveKind::U64)),
            ParamSpec::ambient::<Internal>(),
        ],
        vec![ParamSpec::derived::<UiHandle>()],
        move |set| {
            let stream_id: u64 = set.extract_cloned(&extract_key)?;
            let internal: Internal = set.extract_cloned(&ValueKey::typed::<Internal>())?;
            let remote = RemoteTerminal::new(Arc::clone(&internal.conn), stream_id);
            let conn = Arc::clone(&internal.conn);
            internal
                .cleanup
                .defer(move || conn.close_stream(stream_id));
            Ok(vec![TypedValue::of(UiHandle(Arc::new(remote)))])
        },
    )
}

/// Builds a [`LogBatchWriter`] from the host-advertised log stream id.
fn log_writer_mapper() -> FuncDef {
    let stream_key = ValueKey::typed::<u64>().with_name(LOG_STREAM_ARG);
    let extract_key = stream_key.clone();
    FuncDef::raw(
        "log_writer_from_stream",
        vec![
            ParamSpec::new(stream_key, ArgClass::Primitive(PrimitiveKind::U64)),
            ParamSpec::ambient::<Internal>(),
        ],
        vec![ParamSpec::derived::<LogBatchWriter>()],
        move |set| {
            let stream_id: u64 = set.extract_cloned(&extract_key)?;
            let internal: Internal = set.extract_cloned(&ValueKey::typed::<Internal>())?;
            Ok(vec![TypedValue::of(LogBatchWriter::new(
                Arc::clone(&internal.conn),
                stream_id,
            ))])
        },
    )
}
