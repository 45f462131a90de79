use std::path::Path;
use std::sync::Arc;

use static_responder::config::{self, Gateway};
use static_responder::gateway::{blocking, events, NotFound};
use static_responder::logger;
use static_responder::registry::FileRegistry;
use static_responder::server::{self, Application, Bridge};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg.logging)?;

    // Build the tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let block_size = cfg.block_size()?;

    let mut files = FileRegistry::new(&cfg.statics);
    files.add_files(Path::new(&cfg.statics.root), &cfg.statics.prefix)?;
    if files.is_empty() {
        logger::log_warning(&format!(
            "No files found under '{}', every request falls through",
            cfg.statics.root
        ));
    }
    let files = Arc::new(files);

    let app = match cfg.server.gateway {
        Gateway::Events => Application::Events(Arc::new(events::StaticFiles::new(
            files, NotFound, block_size,
        ))),
        Gateway::Blocking => Application::Blocking(Arc::new(blocking::StaticFiles::new(
            files, NotFound, block_size,
        ))),
    };
    let access_log = cfg
        .logging
        .access_log
        .then(|| cfg.logging.access_log_format.clone());
    let bridge = Arc::new(Bridge::new(app, access_log));

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local.run_until(server::run(listener, bridge)).await?;
    Ok(())
}
