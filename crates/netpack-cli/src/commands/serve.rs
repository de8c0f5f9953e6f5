//! `netpack serve` — Run the HTTP bundling service.

use crate::server::{start_server, ServeConfig};

pub fn execute(port: u16) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(start_server(ServeConfig { port }))
}
