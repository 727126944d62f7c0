mod log_buffer;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pickpack_core::{
    Direction as Heading, Entity, EntityClass, Kind, Position, SimConfig, Tile, World,
    parse_level, random_world,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashSet,
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::log_buffer::LogBuffer;

const DEFAULT_MAP: &str = include_str!("../../maps/warehouse.txt");
const LOG_CAPACITY: usize = 200;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Map file to load, the built-in warehouse when omitted
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Seed of the simulation's random source
    #[arg(short, long)]
    seed: Option<u64>,

    /// Planner lookahead depth
    #[arg(short, long)]
    depth: Option<usize>,

    /// Generate a random world instead of loading a map
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], conflicts_with = "map")]
    random: Option<Vec<usize>>,

    /// Run this many ticks without a terminal and print a summary
    #[arg(long, value_name = "TICKS")]
    headless: Option<u64>,

    /// Simulated seconds per headless tick
    #[arg(long, default_value_t = 0.1)]
    dt: f64,
}

impl Args {
    fn config(&self) -> Result<SimConfig> {
        let mut config = SimConfig::default();
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(depth) = self.depth {
            config.planner.lookahead_depth = depth;
        }
        config.validate()?;
        Ok(config)
    }

    fn load_world(&self, config: SimConfig) -> Result<World> {
        if let Some(size) = &self.random {
            let &[width, height] = size.as_slice() else {
                bail!("--random expects WIDTH and HEIGHT");
            };
            return Ok(random_world(width, height, config)?);
        }
        let world = match &self.map {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read map file {}", path.display()))?;
                parse_level(&text, config)
                    .with_context(|| format!("Failed to load map {}", path.display()))?
            }
            None => parse_level(DEFAULT_MAP, config).context("Failed to load built-in map")?,
        };
        Ok(world)
    }
}

struct App {
    /// The simulated warehouse.
    world: World,
    /// Captured log output.
    logs: LogBuffer,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
}

impl App {
    fn new(world: World, logs: LogBuffer) -> Self {
        App {
            world,
            logs,
            should_quit: false,
            paused: false,
        }
    }

    /// Advances the simulation by `dt` seconds unless paused.
    fn tick(&mut self, dt: f64) {
        if !self.paused {
            self.world.tick(dt);
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('p') => self.paused = !self.paused,
            _ => {}
        }
        let Some(player) = self.world.player() else {
            return;
        };
        let (id, facing) = (player.id, player.direction);
        match code {
            KeyCode::Up => {
                self.world.agent_move(id, Heading::Up, None);
            }
            KeyCode::Down => {
                self.world.agent_move(id, Heading::Down, None);
            }
            KeyCode::Left => {
                self.world.agent_move(id, Heading::Left, None);
            }
            KeyCode::Right => {
                self.world.agent_move(id, Heading::Right, None);
            }
            KeyCode::Char('a') => {
                self.world.agent_pick(id, facing);
            }
            KeyCode::Char('s') => {
                if let Some(item) = player.selected_item().map(|i| i.id) {
                    self.world.agent_put(id, facing, item);
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                let slot = c as usize - '1' as usize;
                self.world.select_item(id, slot);
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    if let Some(ticks) = args.headless {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(io::stderr)
            .try_init();
        let world = args.load_world(config)?;
        return run_headless(world, ticks, args.dt);
    }

    let logs = LogBuffer::new(LOG_CAPACITY);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pickpack_core=debug")),
        )
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .try_init();

    let world = args.load_world(config)?;
    let mut app = App::new(world, logs);

    // Set up the terminal
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Ticks the world without rendering and prints where everyone ended up.
fn run_headless(mut world: World, ticks: u64, dt: f64) -> Result<()> {
    info!(ticks, dt, "running headless");
    for _ in 0..ticks {
        world.tick(dt);
    }
    println!("time: {:.1}s", world.time());
    if let Some(player) = world.player() {
        println!("{} at {}, carrying {}", player, player.position, inventory_summary(player));
    }
    for robot in world.entities_of(EntityClass::Robot) {
        let delivered = robot.robot_state().map_or(0, |s| s.delivered);
        println!(
            "{} at {}, delivered {delivered}, carrying {}",
            robot.name,
            robot.position,
            inventory_summary(robot)
        );
    }
    Ok(())
}

fn inventory_summary(entity: &Entity) -> String {
    if entity.items().is_empty() {
        return "nothing".to_string();
    }
    entity
        .items()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick(last_tick.elapsed().as_secs_f64());
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(frame.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(48)])
        .split(main_layout[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(columns[1]);

    render_map(frame, columns[0], &app.world);
    render_stats(frame, side[0], app);
    render_log(frame, side[1], &app.logs);

    let help_text = Paragraph::new(
        "arrows: move  a: pick  s: put  1-9: select slot  p: pause  q/Esc: quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[1]);
}

fn arrow(direction: Heading) -> char {
    match direction {
        Heading::Up => '^',
        Heading::Down => 'v',
        Heading::Left => '<',
        Heading::Right => '>',
    }
}

/// Two-character glyph of an entity on the map.
fn entity_span(entity: &Entity) -> Span<'static> {
    match &entity.kind {
        Kind::Player { .. } => Span::styled(
            format!("@{}", arrow(entity.direction)),
            Style::default().fg(Color::Red).bold(),
        ),
        Kind::Robot(_) => Span::styled(
            format!("R{}", arrow(entity.direction)),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Kind::Package => {
            let style = Style::default().fg(Color::Yellow);
            if entity.items().is_empty() {
                Span::styled("[]", style)
            } else {
                Span::styled(format!("[{}", entity.items().len()), style)
            }
        }
        Kind::Dispenser => Span::styled("CO", Style::default().fg(Color::Magenta).bold()),
        Kind::Shelf { shelf_id } => {
            let color = if entity.items().is_empty() {
                Color::DarkGray
            } else {
                Color::Green
            };
            let label: String = shelf_id.chars().chain(std::iter::repeat(' ')).take(2).collect();
            Span::styled(label, Style::default().fg(color))
        }
        Kind::Article { .. } => Span::styled("a ", Style::default().fg(Color::White)),
        Kind::PickOrder { .. } => Span::styled("po", Style::default().fg(Color::LightBlue)),
    }
}

/// Renders the warehouse, two characters per cell.
fn render_map(frame: &mut Frame, area: Rect, world: &World) {
    let paths: HashSet<Position> = world
        .entities_of(EntityClass::Robot)
        .filter_map(|robot| robot.robot_state())
        .flat_map(|state| state.last_path.iter().copied())
        .collect();

    let mut lines: Vec<Line> = Vec::with_capacity(world.height());
    for y in 0..world.height() {
        let mut spans: Vec<Span> = Vec::with_capacity(world.width());
        for x in 0..world.width() {
            let position = Position { x, y };
            if let Some(entity) = world.entity_at(position) {
                spans.push(entity_span(entity));
                continue;
            }
            let span = match world.tile_at(position) {
                Some(Tile::Wall) => Span::styled("██", Style::default().fg(Color::DarkGray)),
                _ if paths.contains(&position) => {
                    Span::styled("··", Style::default().fg(Color::Cyan))
                }
                _ => Span::raw("  "),
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Warehouse").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

/// Renders time, the player's inventory and every robot's status.
fn render_stats(frame: &mut Frame, area: Rect, app: &App) {
    let world = &app.world;
    let mut items: Vec<ListItem> = Vec::new();

    let status = if app.paused { " (paused)" } else { "" };
    items.push(ListItem::from(format!("Time: {:.1}s{status}", world.time())));

    if let Some(player) = world.player() {
        items.push(ListItem::from(Line::from(Span::styled(
            format!("{} at {}", player.name, player.position),
            Style::default().bold(),
        ))));
        let selected = player.selected_item().map(|i| i.id);
        for (slot, item) in player.items().iter().enumerate() {
            let marker = if Some(item.id) == selected { '>' } else { ' ' };
            items.push(ListItem::from(format!(" {marker}{} {item}", slot + 1)));
        }
    }

    for robot in world.entities_of(EntityClass::Robot) {
        let Some(state) = robot.robot_state() else {
            continue;
        };
        items.push(ListItem::from(Line::from(Span::styled(
            format!(
                "{} {:?} at {} delivered {}",
                robot.name, state.mode, robot.position, state.delivered
            ),
            Style::default().fg(Color::Cyan),
        ))));
        for item in robot.items() {
            items.push(ListItem::from(format!("   {item}")));
        }
    }

    let stats = List::new(items).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(stats, area);
}

fn render_log(frame: &mut Frame, area: Rect, logs: &LogBuffer) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = logs.tail(visible).into_iter().map(Line::from).collect();
    let log = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Log"))
        .wrap(Wrap { trim: true });
    frame.render_widget(log, area);
}
