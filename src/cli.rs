//! Command-line argument parsing for netaudio-recv

/// Parse command line arguments
#[derive(Debug, Default)]
pub struct Args {
    /// Exit once the first sender stops
    pub once: bool,
    pub validate: bool,
    pub help: bool,
    /// Overrides NETAUDIO_OUTPUT
    pub output: Option<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => result.once = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.output = Some(args[i].clone());
                } else {
                    result.output = Some("output.raw".to_string());
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("netaudio-recv - Network audio receiver\n");
    println!("USAGE:");
    println!("    netaudio-recv [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once                  Exit when the first sender stops");
    println!("    --validate              Validate configuration and exit");
    println!("    --output, -o [PATH]     Write raw s16le audio to PATH (default: output.raw)");
    println!("    --help, -h              Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    NETAUDIO_SOURCE_ADDR    Source packet endpoint (default: 0.0.0.0:10001)");
    println!("    NETAUDIO_REPAIR_ADDR    Repair packet endpoint (default: source port + 1 with FEC)");
    println!("    NETAUDIO_FEC            none, rs or xor");
    println!("    NETAUDIO_LATENCY_MS     Target latency (default: 200)");
    println!("    NETAUDIO_RESAMPLING     Enable latency tuning and rate conversion");
    println!("    See .env.example for the full list");
}
