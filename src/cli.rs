use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::sync::watch;

use crate::backend::HttpBackend;
use crate::capture::{decode_capture, screenshot_bytes_from_data_url};
use crate::config::ClientConfig;
use crate::geometry::RawPoint;
use crate::identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
use crate::selection::{input_channel, InputEvent};
use crate::session::{SessionOrchestrator, SessionPhase, SessionSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drag {
    pub from: RawPoint,
    pub to: RawPoint,
}

#[derive(Parser, Debug)]
#[command(
    name = "seeclick",
    version,
    about = "Select a point or region on a screenshot, search for it and print the results as JSON"
)]
pub struct Cli {
    /// Screenshot to search: a PNG/JPEG file or a text file holding a data URL
    #[arg(long)]
    pub image: PathBuf,

    /// Size of the viewport the screenshot was taken of, as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_viewport)]
    pub viewport: Viewport,

    /// Click position in viewport pixels, as X,Y
    #[arg(long, value_parser = parse_point, conflicts_with = "region", required_unless_present = "region")]
    pub point: Option<RawPoint>,

    /// Region drag in viewport pixels, top-left then bottom-right, as X0,Y0,X1,Y1
    #[arg(long, value_parser = parse_region)]
    pub region: Option<Drag>,

    /// Refinement to apply after results arrive; repeat to chain edits
    #[arg(long = "refine")]
    pub refinements: Vec<String>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Host the screenshot came from, forwarded with the job
    #[arg(long)]
    pub channel: Option<String>,
}

fn parse_numbers(raw: &str, expected: usize) -> Result<Vec<f64>, String> {
    let values = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{part}' is not a number"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != expected {
        return Err(format!("expected {expected} comma-separated numbers, got {}", values.len()));
    }
    Ok(values)
}

fn parse_viewport(raw: &str) -> Result<Viewport, String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{raw}' is not WIDTHxHEIGHT"))?;
    let width = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid viewport width '{width}'"))?;
    let height = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid viewport height '{height}'"))?;
    Ok(Viewport { width, height })
}

fn parse_point(raw: &str) -> Result<RawPoint, String> {
    let values = parse_numbers(raw, 2)?;
    Ok(RawPoint::new(values[0], values[1]))
}

fn parse_region(raw: &str) -> Result<Drag, String> {
    let values = parse_numbers(raw, 4)?;
    // The overlay ignores any other second corner, which would leave the
    // session waiting for a selection forever.
    if values[2] <= values[0] || values[3] <= values[1] {
        return Err("region must be drawn top-left to bottom-right".to_string());
    }
    Ok(Drag {
        from: RawPoint::new(values[0], values[1]),
        to: RawPoint::new(values[2], values[3]),
    })
}

impl Cli {
    /// The overlay input that reproduces the requested selection. A region
    /// is drawn with the modifier held, as a user would.
    pub fn selection_events(&self) -> Vec<InputEvent> {
        match (self.point, self.region) {
            (_, Some(drag)) => vec![
                InputEvent::ModifierDown,
                InputEvent::Click(drag.from),
                InputEvent::PointerMove(drag.to),
                InputEvent::Click(drag.to),
                InputEvent::ModifierUp,
            ],
            (Some(point), None) => vec![InputEvent::Click(point)],
            (None, None) => Vec::new(),
        }
    }
}

fn read_screenshot(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read screenshot {}", path.display()))?;
    if bytes.starts_with(b"data:") {
        let url = std::str::from_utf8(&bytes).context("screenshot data URL is not UTF-8")?;
        return screenshot_bytes_from_data_url(url.trim());
    }
    Ok(bytes)
}

pub(crate) fn is_settled(phase: &SessionPhase) -> bool {
    matches!(
        phase,
        SessionPhase::ResultsShown
            | SessionPhase::TimedOut
            | SessionPhase::Error { .. }
            | SessionPhase::Closed
    )
}

async fn wait_until_settled(
    updates: &mut watch::Receiver<SessionSnapshot>,
) -> Result<SessionSnapshot> {
    loop {
        {
            let snapshot = updates.borrow_and_update();
            if is_settled(&snapshot.phase) {
                return Ok(snapshot.clone());
            }
        }
        updates
            .changed()
            .await
            .context("session stopped publishing updates")?;
    }
}

/// Run one session end to end against the configured backend.
pub async fn execute(cli: Cli, config: ClientConfig) -> Result<SessionSnapshot> {
    let screenshot = read_screenshot(&cli.image)?;
    let capture = decode_capture(screenshot, cli.viewport.width, cli.viewport.height).await?;

    let backend = Arc::new(HttpBackend::new(
        config.base_url.clone(),
        config.request_timeout(),
    )?);
    let identity: Arc<dyn IdentityStore> = match &config.identity_path {
        Some(path) => Arc::new(FileIdentityStore::new(path.clone())?),
        None => Arc::new(MemoryIdentityStore::new()),
    };
    info!("Using backend at {}", backend.base_url());

    let session = SessionOrchestrator::new(backend, identity, &config, cli.channel.clone());
    let mut updates = session.subscribe();
    session.screenshot_ready(capture).await?;

    let (subscription, stream) = input_channel();
    let driver = tokio::spawn({
        let session = session.clone();
        async move { session.drive(stream).await }
    });

    let events = cli.selection_events();
    if events.is_empty() {
        bail!("either --point or --region is required");
    }
    for event in events {
        subscription.send(event)?;
    }

    let mut snapshot = wait_until_settled(&mut updates).await?;
    for text in &cli.refinements {
        if !snapshot.phase.accepts_refinement() {
            warn!("Skipping refinement '{}': session is {}", text, snapshot.phase);
            break;
        }
        session.refine(text).await?;
        snapshot = wait_until_settled(&mut updates).await?;
    }

    session.close().await;
    driver.await.context("input driver panicked")?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("seeclick").chain(args.iter().copied()))
    }

    #[test]
    fn point_invocation_parses() {
        let cli = parse(&["--image", "shot.png", "--viewport", "1000x800", "--point", "100,100"])
            .unwrap();
        assert_eq!(
            cli.viewport,
            Viewport {
                width: 1000,
                height: 800
            }
        );
        assert_eq!(
            cli.selection_events(),
            vec![InputEvent::Click(RawPoint::new(100.0, 100.0))]
        );
        assert!(cli.refinements.is_empty());
    }

    #[test]
    fn region_replays_modifier_drag() {
        let cli = parse(&[
            "--image",
            "shot.png",
            "--viewport",
            "1000x800",
            "--region",
            "50,50,60,80",
            "--refine",
            "in blue",
            "--refine",
            "cheaper",
        ])
        .unwrap();
        let events = cli.selection_events();
        assert_eq!(events.first(), Some(&InputEvent::ModifierDown));
        assert_eq!(events[1], InputEvent::Click(RawPoint::new(50.0, 50.0)));
        assert_eq!(events[3], InputEvent::Click(RawPoint::new(60.0, 80.0)));
        assert_eq!(cli.refinements, vec!["in blue", "cheaper"]);
    }

    #[test]
    fn selection_is_required_and_exclusive() {
        assert!(parse(&["--image", "a.png", "--viewport", "10x10"]).is_err());
        assert!(parse(&[
            "--image",
            "a.png",
            "--viewport",
            "10x10",
            "--point",
            "1,1",
            "--region",
            "1,1,2,2"
        ])
        .is_err());
    }

    #[test]
    fn backward_region_is_a_usage_error() {
        for region in ["20,20,10,10", "20,20,30,20", "20,20,20,30"] {
            let err = parse(&["--image", "a.png", "--viewport", "40x30", "--region", region])
                .unwrap_err();
            assert!(
                err.to_string().contains("top-left to bottom-right"),
                "{region}: {err}"
            );
        }
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(parse_viewport("1000by800").is_err());
        assert!(parse_viewport("1000x").is_err());
        assert!(parse_point("1,2,3").is_err());
        assert!(parse_region("1,2,x,4").is_err());
    }

    #[test]
    fn data_url_files_are_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.txt");
        fs::write(&path, "data:image/png;base64,AAEC\n").unwrap();
        assert_eq!(read_screenshot(&path).unwrap(), vec![0, 1, 2]);

        let raw = dir.path().join("shot.png");
        fs::write(&raw, [0x89, b'P', b'N', b'G']).unwrap();
        assert_eq!(read_screenshot(&raw).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn only_terminal_or_waiting_phases_settle() {
        assert!(is_settled(&SessionPhase::ResultsShown));
        assert!(is_settled(&SessionPhase::TimedOut));
        assert!(!is_settled(&SessionPhase::Polling));
        assert!(!is_settled(&SessionPhase::Refining));
        assert!(!is_settled(&SessionPhase::Selecting));
    }
}
