use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use netaudio::audio::{NullSink, RawFileSink, Sink};
use netaudio::cli::{parse_args, print_help};
use netaudio::config::Config;
use netaudio::net::Endpoint;
use netaudio::pipeline::{EndpointType, PacketParser, Pump, PumpMode, SessionGroup};
use netaudio::rtp::FormatMap;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("netaudio=info".parse()?),
        )
        .init();

    info!("netaudio receiver v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if let Some(output) = args.output {
        config.output_path = Some(output);
    }
    info!("Configuration loaded");
    info!("  Source endpoint: {}", config.source_addr);
    if let Some(repair) = config.repair_addr {
        info!("  Repair endpoint: {} ({:?})", repair, config.session.fec_scheme);
    }
    info!(
        "  Latency: {}ms, payload type {}, output {} Hz",
        config.session.target_latency / netaudio::packet::MILLISECOND,
        config.session.payload_type,
        config.common.output_sample_rate
    );

    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let format_map = Arc::new(FormatMap::default());
    let group = Arc::new(SessionGroup::new(
        config.session.clone(),
        config.common.clone(),
        Arc::clone(&format_map),
    ));
    let cancel_token = CancellationToken::new();

    let mut endpoints = vec![(EndpointType::Source, config.source_addr)];
    if let Some(repair) = config.repair_addr {
        endpoints.push((EndpointType::Repair, repair));
    }

    let mut receivers = Vec::new();
    for (endpoint_type, addr) in endpoints {
        let parser = PacketParser::new(endpoint_type, config.session.fec_scheme, Arc::clone(&format_map));
        let mut endpoint = Endpoint::bind(addr, parser).await?;
        let group = Arc::clone(&group);
        let cancel = cancel_token.clone();
        receivers.push(tokio::spawn(async move { endpoint.run(group, cancel).await }));
    }

    // Audio runs on its own thread, pulling at the output clock
    let mut sink: Box<dyn Sink> = match &config.output_path {
        Some(path) => Box::new(RawFileSink::create(path)?),
        None => Box::new(NullSink::new()),
    };
    let mode = if args.once { PumpMode::Oneshot } else { PumpMode::Permanent };
    let mut pump = Pump::new(
        config.common.output_spec(),
        config.common.frame_size(),
        mode,
        config.common.timing,
    );
    let mut reader = group.reader();
    let pump_cancel = cancel_token.clone();
    let pump_handle = std::thread::Builder::new()
        .name("netaudio-pump".to_string())
        .spawn(move || pump.run(&mut reader, sink.as_mut(), &pump_cancel))
        .context("Failed to start audio thread")?;

    let mut pump_join = tokio::task::spawn_blocking(move || pump_handle.join());
    let pump_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            cancel_token.cancel();
            pump_join.await
        }
        result = &mut pump_join => result,
    };
    cancel_token.cancel();

    for receiver in receivers {
        match receiver.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Receiver error: {}", e),
            Err(e) => error!("Receiver task error: {}", e),
        }
    }

    match pump_result {
        Ok(Ok(Ok(stats))) => info!("Audio done: {} frames, {} samples", stats.frames, stats.samples),
        Ok(Ok(Err(e))) => error!("Audio error: {}", e),
        Ok(Err(_)) => error!("Audio thread panicked"),
        Err(e) => error!("Audio join task error: {}", e),
    }

    Ok(())
}
