use ocrkit::cli::parse_cli;
use ocrkit::host::{self, HostError};
use ocrkit::logging::init_tracing;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), HostError> {
    let (args, sources) = parse_cli();
    init_tracing(args.verbose);
    host::run(args, sources).await
}
