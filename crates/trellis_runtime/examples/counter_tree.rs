//! Counter Tree Demo
//!
//! Drives a small workflow tree (a scoreboard with one counter per team)
//! from a scripted sequence of taps, logging every step and recording the
//! session.
//!
//! Run with: cargo run -p trellis_runtime --example counter_tree
//! Set RUST_LOG=trellis_core=trace to see every render pass.

use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use trellis_runtime::prelude::*;
use trellis_runtime::trellis_core::{ObserverSet, TracingObserver};

struct Team {
    name: &'static str,
}

enum Tap {
    Score,
    Undo,
}

impl WorkflowAction for Tap {
    type Workflow = Team;

    fn apply(self, score: &mut u32) -> Option<u32> {
        match self {
            Tap::Score => *score += 1,
            Tap::Undo => *score = score.saturating_sub(1),
        }
        (*score == 3).then_some(*score)
    }
}

struct TeamScreen {
    name: &'static str,
    score: u32,
    tap: Sink<Tap>,
}

impl Workflow for Team {
    type State = u32;
    type Rendering = TeamScreen;
    type Output = u32;

    fn make_initial_state(&self) -> u32 {
        0
    }

    fn render(&self, score: &u32, context: &mut RenderContext<'_, Self>) -> TeamScreen {
        TeamScreen {
            name: self.name,
            score: *score,
            tap: context.make_sink(),
        }
    }
}

struct Scoreboard {
    teams: Vec<&'static str>,
}

struct ScoreboardScreen {
    winner: Option<String>,
    teams: Vec<TeamScreen>,
}

impl Workflow for Scoreboard {
    type State = Option<String>;
    type Rendering = ScoreboardScreen;
    type Output = String;

    fn make_initial_state(&self) -> Option<String> {
        None
    }

    fn render(
        &self,
        winner: &Option<String>,
        context: &mut RenderContext<'_, Self>,
    ) -> ScoreboardScreen {
        let teams = self
            .teams
            .iter()
            .map(|&name| {
                context.render_child(Team { name }, name, move |_score| {
                    AnyWorkflowAction::from_fn(move |winner: &mut Option<String>| {
                        if winner.is_some() {
                            return None;
                        }
                        *winner = Some(name.to_string());
                        Some(name.to_string())
                    })
                })
            })
            .collect();
        ScoreboardScreen {
            winner: winner.clone(),
            teams,
        }
    }
}

fn print_screen(screen: &ScoreboardScreen) {
    let scores: Vec<String> = screen
        .teams
        .iter()
        .map(|team| format!("{} {}", team.name, team.score))
        .collect();
    println!(
        "  [{}] winner: {}",
        scores.join(" | "),
        screen.winner.as_deref().unwrap_or("-")
    );
}

fn main() -> Result<()> {
    trellis_runtime::init()?;

    let session = Arc::new(SharedRecordingSession::new(
        RecordingConfig::standard().with_app_name("counter_tree"),
    ));
    session.start();

    let observers = ObserverSet::new()
        .with(Rc::new(TracingObserver))
        .with(Rc::new(WorkflowRecorder::new(session.clone())));
    let mut host = WorkflowHost::with_observer(
        Scoreboard {
            teams: vec!["red", "blue"],
        },
        HostConfig::debug().with_name("scoreboard"),
        Rc::new(observers),
    );
    attach(&mut host, session.clone());
    host.on_rendering(print_screen);
    host.on_output(|winner: &String| println!("  >> {winner} wins"));

    println!("Initial:");
    print_screen(host.rendering());

    let script = [
        (0, Tap::Score),
        (1, Tap::Score),
        (0, Tap::Score),
        (0, Tap::Undo),
        (1, Tap::Score),
        (1, Tap::Score),
        (0, Tap::Score),
        (0, Tap::Score),
    ];
    for (team, tap) in script {
        host.rendering().teams[team].tap.send(tap);
        host.process_events()?;
    }

    println!("Adding a third team:");
    host.update(Scoreboard {
        teams: vec!["red", "blue", "green"],
    });

    session.stop();
    let export = session.export();
    println!(
        "Recorded {} events and {} snapshots",
        export.stats.total_events, export.stats.total_snapshots
    );

    let path = std::env::temp_dir().join("counter_tree_recording.json");
    export.save(&path)?;
    println!("Recording saved to {}", path.display());

    Ok(())
}
