//! A music player playlist, with command arguments from `#[derive(Generate)]`.
//!
//! Run with `cargo run -p lockstep --features derive --example playlist`.

use lockstep::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct Model {
    playing: bool,
    tracks: usize,
    names: BTreeSet<String>,
}

#[derive(Debug)]
struct Player {
    tracks: Vec<String>,
    current: usize,
    playing: bool,
}

impl Player {
    fn new() -> Self {
        Player {
            tracks: vec!["intro".to_string()],
            current: 0,
            playing: false,
        }
    }

    fn insert(&mut self, position: usize, name: &str) {
        self.tracks.insert(position, name.to_string());
        // Bug: the cursor is not moved when inserting before it
    }
}

#[derive(Generate, Debug, Clone)]
struct AddTrack {
    #[generator(Gen::<usize>::int_range(0, 10))]
    position: usize,
    #[generator(Gen::<String>::alpha_string(1, 6))]
    name: String,
}

#[derive(Generate, Debug, Clone)]
enum Transport {
    Play,
    Pause,
    Skip,
}

impl Command<Model, Player> for AddTrack {
    fn check(&self, model: &Model) -> bool {
        !model.names.contains(&self.name)
    }

    fn apply(&self, model: &mut Model) {
        model.tracks += 1;
        model.names.insert(self.name.clone());
    }

    fn run(&self, model: &Model, real: &mut Player) -> Result<(), Failure> {
        let before = real.tracks[real.current].clone();
        real.insert(self.position % (model.tracks + 1), &self.name);
        ensure_eq!(real.tracks[real.current], before, "current track moved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("AddTrack({}, {:?})", self.position, self.name)
    }
}

impl Command<Model, Player> for Transport {
    fn apply(&self, model: &mut Model) {
        match self {
            Transport::Play => model.playing = true,
            Transport::Pause => model.playing = false,
            Transport::Skip => {}
        }
    }

    fn run(&self, model: &Model, real: &mut Player) -> Result<(), Failure> {
        match self {
            Transport::Play => real.playing = true,
            Transport::Pause => real.playing = false,
            Transport::Skip => real.current = (real.current + 1) % real.tracks.len(),
        }
        let expected = match self {
            Transport::Play => true,
            Transport::Pause => false,
            Transport::Skip => model.playing,
        };
        ensure_eq!(real.playing, expected);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

fn main() {
    let machine = StateMachine::new(|| {
        let model = Model {
            playing: false,
            tracks: 1,
            names: ["intro".to_string()].into_iter().collect(),
        };
        (model, Player::new())
    })
    .named("playlist")
    .command(AddTrack::arbitrary())
    .weighted(3, Transport::arbitrary());

    match machine.run(&Config::default().with_tests(300)) {
        Ok(report) => println!("{report}"),
        Err(err) => println!("error: {err}"),
    }
}
