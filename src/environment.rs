use ndarray::{s, Array1, Array3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{DqnError, Result};

/// Outcome of a single environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub next_state: Array1<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Episodic environment with a discrete action space and flat observations.
pub trait Environment {
    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> Array1<f32>;

    /// Apply `action` and advance one step.
    fn step(&mut self, action: usize) -> Result<Step>;

    fn action_count(&self) -> usize;

    /// Length of every observation vector.
    fn observation_size(&self) -> usize;
}

/// Grid world settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridWorldConfig {
    /// Side length of the playable arena.
    pub size: usize,
    /// Pixels per cell in the rendered observation.
    pub render_scale: usize,
    /// Number of goal objects (reward +1).
    pub goals: usize,
    /// Number of fire objects (reward -1).
    pub hazards: usize,
    pub seed: Option<u64>,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        GridWorldConfig {
            size: 5,
            render_scale: 12,
            goals: 4,
            hazards: 2,
            seed: None,
        }
    }
}

impl GridWorldConfig {
    /// Flattened observation length: `((size + 2) * scale)^2 * 3`.
    pub fn observation_size(&self) -> usize {
        let side = (self.size + 2) * self.render_scale;
        side * side * 3
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(DqnError::invalid_config("environment.size", "must be > 0"));
        }
        if self.render_scale == 0 {
            return Err(DqnError::invalid_config("environment.render_scale", "must be > 0"));
        }
        if self.goals + self.hazards + 1 > self.size * self.size {
            return Err(DqnError::invalid_config(
                "environment.goals".to_string(),
                format!(
                    "{} goals, {} hazards and the hero do not fit on a {}x{} grid",
                    self.goals, self.hazards, self.size, self.size
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjectKind {
    Hero,
    Goal,
    Fire,
}

impl ObjectKind {
    /// RGB channel the object is drawn in.
    fn channel(self) -> usize {
        match self {
            ObjectKind::Fire => 0,
            ObjectKind::Goal => 1,
            ObjectKind::Hero => 2,
        }
    }

    fn reward(self) -> f32 {
        match self {
            ObjectKind::Goal => 1.0,
            ObjectKind::Fire => -1.0,
            ObjectKind::Hero => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GridObject {
    x: usize,
    y: usize,
    kind: ObjectKind,
}

/// Square arena with a hero, goals and fires.
///
/// Actions: 0 up, 1 down, 2 left, 3 right. Walking into a wall leaves the
/// hero in place. Landing on an object collects its reward and respawns it
/// on a random free cell. The episode never ends by itself.
pub struct GridWorld {
    config: GridWorldConfig,
    hero: (usize, usize),
    objects: Vec<GridObject>,
    rng: StdRng,
}

impl GridWorld {
    pub const ACTIONS: usize = 4;

    pub fn new(config: GridWorldConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = GridWorld {
            config,
            hero: (0, 0),
            objects: Vec::new(),
            rng,
        };
        world.populate();
        Ok(world)
    }

    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    pub fn hero(&self) -> (usize, usize) {
        self.hero
    }

    fn free_position(&mut self) -> (usize, usize) {
        let size = self.config.size;
        let occupied: Vec<(usize, usize)> = self
            .objects
            .iter()
            .map(|o| (o.x, o.y))
            .chain(std::iter::once(self.hero))
            .collect();
        let free: Vec<(usize, usize)> = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .filter(|cell| !occupied.contains(cell))
            .collect();
        // validate() guarantees at least one free cell
        *free.choose(&mut self.rng).unwrap_or(&self.hero)
    }

    fn populate(&mut self) {
        self.objects.clear();
        let size = self.config.size;
        let mut cells: Vec<(usize, usize)> = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .collect();
        cells.shuffle(&mut self.rng);
        let mut cells = cells.into_iter();
        if let Some(hero) = cells.next() {
            self.hero = hero;
        }
        let kinds = std::iter::repeat(ObjectKind::Goal)
            .take(self.config.goals)
            .chain(std::iter::repeat(ObjectKind::Fire).take(self.config.hazards));
        for (kind, (x, y)) in kinds.zip(cells) {
            self.objects.push(GridObject { x, y, kind });
        }
    }

    fn move_hero(&mut self, action: usize) {
        let (x, y) = self.hero;
        let last = self.config.size - 1;
        self.hero = match action {
            0 => (x, y.saturating_sub(1)),
            1 => (x, (y + 1).min(last)),
            2 => (x.saturating_sub(1), y),
            _ => ((x + 1).min(last), y),
        };
    }

    fn collect(&mut self) -> f32 {
        let (hx, hy) = self.hero;
        let Some(index) = self.objects.iter().position(|o| o.x == hx && o.y == hy) else {
            return 0.0;
        };
        let kind = self.objects.remove(index).kind;
        let (x, y) = self.free_position();
        self.objects.push(GridObject { x, y, kind });
        kind.reward()
    }

    /// Render the arena as an RGB image with a white border, one cell
    /// upscaled to `render_scale` pixels (nearest neighbour).
    pub fn render(&self) -> Array3<f32> {
        let cells = self.config.size + 2;
        let mut grid = Array3::<f32>::ones((cells, cells, 3));
        grid.slice_mut(s![1..cells - 1, 1..cells - 1, ..]).fill(0.0);
        let hero = GridObject { x: self.hero.0, y: self.hero.1, kind: ObjectKind::Hero };
        for object in self.objects.iter().chain(std::iter::once(&hero)) {
            grid[[object.y + 1, object.x + 1, object.kind.channel()]] = 1.0;
        }

        let scale = self.config.render_scale;
        let side = cells * scale;
        Array3::from_shape_fn((side, side, 3), |(py, px, c)| grid[[py / scale, px / scale, c]])
    }

    fn observe(&self) -> Array1<f32> {
        self.render().iter().copied().collect()
    }
}

impl Environment for GridWorld {
    fn reset(&mut self) -> Array1<f32> {
        self.populate();
        self.observe()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        if action >= Self::ACTIONS {
            return Err(DqnError::InvalidAction {
                action,
                action_count: Self::ACTIONS,
            });
        }
        self.move_hero(action);
        let reward = self.collect();
        Ok(Step {
            next_state: self.observe(),
            reward,
            done: false,
        })
    }

    fn action_count(&self) -> usize {
        Self::ACTIONS
    }

    fn observation_size(&self) -> usize {
        self.config.observation_size()
    }
}
