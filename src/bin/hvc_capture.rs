//! hvc_capture - Run the detection loop against a live sensor.
//!
//! Connects to the device over a serial tty, applies the configured
//! settings and logs one line per detection until interrupted. Without the
//! native stabilization engine the loop uses the stub stabilizer, which
//! assigns index-stable identities and does no smoothing.

use anyhow::{anyhow, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture detection results from an HVC-P2 sensor")]
struct Args {
    /// Serial device path, e.g. /dev/ttyACM0.
    #[arg(long, env = "HVC_ENDPOINT")]
    endpoint: Option<String>,

    /// Comma-separated features: body,hand,face,direction,age,gender,gaze,
    /// blink,expression,recognition.
    #[arg(long, default_value = "body,face,direction,age,gender")]
    features: String,

    /// Run without any stabilizer (tracking ids stay -1).
    #[arg(long)]
    no_stabilizer: bool,

    /// Frames to capture; 0 runs until interrupted.
    #[arg(long, default_value = "0")]
    frames: u64,

    /// Output image per frame: none, qvga or qqvga.
    #[arg(long, default_value = "none")]
    image: String,
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<()> {
    let _ = Args::parse();
    Err(anyhow!("serial capture is only supported on linux"))
}

#[cfg(target_os = "linux")]
fn main() -> Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use anyhow::Context;
    use hvcp2::stabilizer::Stabilizer;
    use hvcp2::{
        Device, Error, FeatureFlags, OutputImage, Session, SessionConfig, StubStabilizer,
        TtyTransport,
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = SessionConfig::load().context("load session config")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    let features = parse_features(&args.features)?;
    let image_mode = parse_image_mode(&args.image)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("install signal handler")?;
    }

    let mut device = Device::new(TtyTransport::new());
    device
        .connect(&config.endpoint, config.baud, config.timeout)
        .with_context(|| format!("connect to {}", config.endpoint))?;
    let version = device.get_version()?;
    log::info!(
        "connected: {} v{}.{}.{} rev {}",
        version.model,
        version.major,
        version.minor,
        version.release,
        version.revision
    );

    let stabilizer: Option<Box<dyn Stabilizer>> = if args.no_stabilizer {
        None
    } else {
        log::info!("using stub stabilizer (index-stable identities, no smoothing)");
        Some(Box::new(StubStabilizer::new()))
    };

    let mut session = Session::open(device, features, stabilizer, &config)?;
    log::info!("executing with features {:#06x}", session.features().bits());

    let mut captured = 0u64;
    while running.load(Ordering::SeqCst) && (args.frames == 0 || captured < args.frames) {
        let capture = match session.execute(image_mode) {
            Ok(capture) => capture,
            Err(Error::Protocol(fault)) => {
                // The next transact clears the desynchronized channel.
                log::warn!("protocol fault, dropping frame: {}", fault);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        captured += 1;

        if !capture.response.is_normal() {
            log::warn!("device: {}", capture.response);
            continue;
        }
        if capture.stabilizer_status != 0 {
            log::warn!("stabilizer status {}", capture.stabilizer_status);
            continue;
        }

        let tracking = &capture.tracking;
        log::info!(
            "frame {}: {} bodies, {} hands, {} faces",
            captured,
            tracking.bodies.len(),
            tracking.hands.len(),
            tracking.faces.len()
        );
        for face in &tracking.faces {
            let mut line = format!(
                "  face track={} at ({}, {}) size={} conf={}",
                face.tracking_id,
                face.detection.x,
                face.detection.y,
                face.detection.size,
                face.detection.confidence
            );
            if let Some(age) = face.age {
                line.push_str(&format!(" age={}", age.value));
            }
            if let Some(gender) = face.gender {
                let label = match gender.value {
                    0 => "female",
                    1 => "male",
                    _ => "?",
                };
                line.push_str(&format!(" gender={}", label));
            }
            if let Some(recognition) = face.recognition {
                line.push_str(&format!(
                    " user={} score={}",
                    recognition.value, recognition.confidence
                ));
            }
            log::info!("{}", line);
        }
    }

    session.close()?;
    log::info!("captured {} frames", captured);
    Ok(())
}

#[cfg(target_os = "linux")]
fn parse_features(list: &str) -> Result<hvcp2::FeatureFlags> {
    use hvcp2::FeatureFlags;

    let mut flags = FeatureFlags::empty();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        flags |= match name.to_ascii_lowercase().as_str() {
            "body" => FeatureFlags::BODY,
            "hand" => FeatureFlags::HAND,
            "face" => FeatureFlags::FACE,
            "direction" => FeatureFlags::DIRECTION,
            "age" => FeatureFlags::AGE,
            "gender" => FeatureFlags::GENDER,
            "gaze" => FeatureFlags::GAZE,
            "blink" => FeatureFlags::BLINK,
            "expression" => FeatureFlags::EXPRESSION,
            "recognition" => FeatureFlags::RECOGNITION,
            other => return Err(anyhow!("unknown feature '{}'", other)),
        };
    }
    if flags.is_empty() {
        return Err(anyhow!("no features selected"));
    }
    Ok(flags)
}

#[cfg(target_os = "linux")]
fn parse_image_mode(mode: &str) -> Result<hvcp2::OutputImage> {
    use hvcp2::OutputImage;

    match mode.to_ascii_lowercase().as_str() {
        "none" => Ok(OutputImage::None),
        "qvga" => Ok(OutputImage::Qvga),
        "qqvga" => Ok(OutputImage::Qqvga),
        other => Err(anyhow!("unknown image mode '{}'", other)),
    }
}
