use clap::Parser;
use log::info;
use mura_bodypart::{ClassifierError, ErrorReport, ModelLoader, PredictionResult, Predictor, RuntimeConfig};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const PROGRAM: &str = "mura-bodypart";

#[derive(Parser, Debug)]
#[command(
    name = PROGRAM,
    about = "Classify the body part shown in a radiograph",
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// Path to the radiograph image
    #[arg(allow_hyphen_values = true)]
    image_path: PathBuf,
}

/// Accepts exactly one argument after the program name. The argument is
/// always taken as the image path, even when it starts with a hyphen.
fn parse_args<I>(argv: I) -> Result<Args, ClassifierError>
where
    I: IntoIterator<Item = OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().collect();
    if argv.len() != 2 || argv[1] == "--" {
        return Err(ClassifierError::usage(PROGRAM));
    }
    let image_path = argv[1].clone();
    Args::try_parse_from([OsString::from(PROGRAM), OsString::from("--"), image_path])
        .map_err(|_| ClassifierError::usage(PROGRAM))
}

fn main() -> ExitCode {
    mura_bodypart::init_logger();

    let args = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            emit_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args).and_then(|result| emit_success(&result)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            emit_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<PredictionResult, ClassifierError> {
    info!("Starting model loading...");
    let loader = ModelLoader::for_runtime(RuntimeConfig::default());
    let model = loader.load_default()?;
    let model_info = model.info();
    info!("Model {} on {}: {}", model_info.spec_version, model_info.device, model_info.topology);
    info!("Model loaded, starting prediction...");

    let result = Predictor::new(&model).predict_file(&args.image_path)?;
    info!("Prediction completed");
    Ok(result)
}

/// Writes the result as a single JSON line on stdout.
fn emit_success(result: &PredictionResult) -> Result<(), ClassifierError> {
    let json = result
        .to_json()
        .map_err(|e| ClassifierError::prediction(format!("Failed to serialize result: {}", e), None))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", json)
        .and_then(|_| out.flush())
        .map_err(|e| ClassifierError::prediction(format!("Failed to write result: {}", e), None))?;

    info!("Output sent to stdout");
    Ok(())
}

fn emit_error(err: &ClassifierError) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    let _ = ErrorReport::write_to(&mut out, err);
}
