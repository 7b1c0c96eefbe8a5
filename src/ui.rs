//! Layout and drawing: menu, playfield, sidebar, game over.

use crate::app::{FinishedGame, MenuState, MenuTab, Screen};
use crate::challenge::ChallengeToken;
use crate::game::{Outcome, Snapshot};
use crate::GameMode;
use crate::pieces::PieceType;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each board cell is two terminal columns wide so cells look square.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;
/// Board fade after the game ends.
const GAME_OVER_FADE_MS: u32 = 600;

/// Per-run context the session itself doesn't carry.
pub struct Hud<'a> {
    pub mode: GameMode,
    /// Practice quota from `--lines`; no code will be issued.
    pub custom_quota: bool,
    pub name: &'a str,
    pub challenge: Option<&'a ChallengeToken>,
    pub finished: Option<&'a FinishedGame>,
}

/// Board size in terminal cells, border included. Saturates at `u16::MAX`.
fn playfield_outer_size(width: usize, height: usize) -> (u16, u16) {
    let to_u16 = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
    let w = to_u16(width).saturating_mul(CELL_WIDTH).saturating_add(2);
    let h = to_u16(height).saturating_add(2);
    (w, h)
}

/// Centre a `width` x `height` rect inside `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn bold(style: Style) -> Style {
    style.add_modifier(Modifier::BOLD)
}

/// Draw the current screen. On game over the board fades out with a TachyonFX effect
/// kept in `game_over_effect`; `effect_time` tracks when it was last processed.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    snapshot: &Snapshot,
    hud: &Hud,
    menu_state: &MenuState,
    theme: &Theme,
    game_over_effect: &mut Option<Effect>,
    effect_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    Block::default()
        .style(Style::default().bg(theme.bg))
        .render(area, frame.buffer_mut());

    match screen {
        Screen::Menu => draw_menu(frame, menu_state, hud, theme, area),
        Screen::Playing => {
            draw_game(frame, snapshot, hud, theme, area, false);
        }
        Screen::GameOver => {
            let faded = game_over_effect.as_ref().is_some_and(Effect::done);
            let board_rect = draw_game(frame, snapshot, hud, theme, area, faded);
            if !faded {
                apply_game_over_effect(frame, theme, board_rect, game_over_effect, effect_time, now);
            }
            draw_game_over(frame, snapshot, hud, theme, area);
        }
    }
}

fn apply_game_over_effect(
    frame: &mut Frame,
    theme: &Theme,
    board_rect: Rect,
    game_over_effect: &mut Option<Effect>,
    effect_time: &mut Option<Instant>,
    now: Instant,
) {
    let delta = effect_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *effect_time = Some(now);

    let effect = game_over_effect.get_or_insert_with(|| {
        fx::fade_to(
            theme.inactive_fg,
            theme.bg,
            (GAME_OVER_FADE_MS, Interpolation::Linear),
        )
        .with_area(board_rect)
    });
    frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
}

/// Playfield plus sidebar, centred. Returns the board's inner rect.
fn draw_game(
    frame: &mut Frame,
    snapshot: &Snapshot,
    hud: &Hud,
    theme: &Theme,
    area: Rect,
    dimmed: bool,
) -> Rect {
    let (pw, ph) = playfield_outer_size(snapshot.board.width, snapshot.board.height);
    let total_w = pw.saturating_add(SIDEBAR_WIDTH);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let board_rect = draw_playfield(frame, snapshot, theme, inner[0], dimmed);
    draw_sidebar(frame, snapshot, hud, theme, inner[1]);
    board_rect
}

fn draw_playfield(
    frame: &mut Frame,
    snapshot: &Snapshot,
    theme: &Theme,
    area: Rect,
    dimmed: bool,
) -> Rect {
    let title = format!(" Quotris  {} left ", snapshot.lines_remaining.max(0));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let board_rect = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for (row, cells) in snapshot.board.rows().iter().enumerate() {
        for (col, &color_id) in cells.iter().enumerate() {
            let color = if dimmed && color_id != crate::board::EMPTY {
                theme.inactive_fg
            } else {
                theme.cell_color(color_id)
            };
            paint_cell(buf, board_rect, row as i32, col as i32, color);
        }
    }
    if let Some(piece) = snapshot.active {
        let color = if dimmed {
            theme.inactive_fg
        } else {
            theme.cell_color(piece.color_id)
        };
        for (row, col) in piece.absolute_cells() {
            paint_cell(buf, board_rect, row, col, color);
        }
    }
    board_rect
}

/// Fill one board cell; cells outside the board rect are skipped.
fn paint_cell(buf: &mut Buffer, board_rect: Rect, row: i32, col: i32, color: Color) {
    let (Ok(row), Ok(col)) = (u32::try_from(row), u32::try_from(col)) else {
        return;
    };
    let y = u32::from(board_rect.y) + row;
    if y >= u32::from(board_rect.bottom()) {
        return;
    }
    for dx in 0..CELL_WIDTH {
        let x = u32::from(board_rect.x) + col * u32::from(CELL_WIDTH) + u32::from(dx);
        if x >= u32::from(board_rect.right()) {
            return;
        }
        // both below a u16 rect edge
        let (x, y) = (x as u16, y as u16);
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_symbol(" ").set_bg(color);
        }
    }
}

fn format_time(secs: f64) -> String {
    format!("{secs:.2}s")
}

fn draw_sidebar(frame: &mut Frame, snapshot: &Snapshot, hud: &Hud, theme: &Theme, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // stats
            Constraint::Length(1),
            Constraint::Length(4), // quota progress
            Constraint::Length(1),
            Constraint::Length(5), // challenger
            Constraint::Length(3), // colours
        ])
        .split(area);

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let mode_label = if hud.custom_quota {
        format!("Practice {}", snapshot.quota)
    } else {
        hud.mode.label().to_string()
    };
    let secs = snapshot.elapsed.as_secs_f64();
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats = vec![
        stat("Player: ", hud.name.to_string()),
        stat("Mode:   ", mode_label),
        stat("Level:  ", snapshot.level.to_string()),
        stat(
            "Piece:  ",
            snapshot.active.map_or("-", |p| p.kind.name()).to_string(),
        ),
        stat("Lines:  ", snapshot.lines_remaining.max(0).to_string()),
        stat("Time:   ", format_time(secs)),
    ];
    Paragraph::new(Text::from(stats)).render(stats_inner, frame.buffer_mut());

    let progress_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let progress_inner = progress_block.inner(chunks[2]);
    progress_block.render(chunks[2], frame.buffer_mut());
    let progress_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(progress_inner);
    Paragraph::new(Line::from(Span::styled(
        format!("Cleared {}/{}", snapshot.lines_cleared, snapshot.quota),
        title_style,
    )))
    .render(progress_layout[0], frame.buffer_mut());
    let ratio = if snapshot.quota > 0 {
        (f64::from(snapshot.lines_cleared) / f64::from(snapshot.quota)).min(1.0)
    } else {
        0.0
    };
    Gauge::default()
        .ratio(ratio)
        .gauge_style(Style::default().fg(theme.cell_color(PieceType::S.color_id())))
        .render(progress_layout[1], frame.buffer_mut());

    let challenge_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Challenge ", title_style));
    let challenge_inner = challenge_block.inner(chunks[4]);
    challenge_block.render(chunks[4], frame.buffer_mut());
    let challenge_lines = match hud.challenge {
        Some(c) => {
            let delta = secs - c.elapsed_secs;
            let pace_style = if delta <= 0.0 {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            vec![
                stat("Rival: ", c.name.clone()),
                stat("Time:  ", format_time(c.elapsed_secs)),
                Line::from(Span::styled(format!("Pace:  {delta:+.2}s"), pace_style)),
            ]
        }
        None => vec![Line::from(Span::styled("No rival", fg_style))],
    };
    Paragraph::new(Text::from(challenge_lines)).render(challenge_inner, frame.buffer_mut());

    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[5]);
    colours_block.render(chunks[5], frame.buffer_mut());
    draw_colour_strip(frame, theme, colours_inner);
}

/// One swatch per piece, in palette order.
fn draw_colour_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let swatch_w = (area.width / PieceType::ALL.len() as u16).max(1);
    for (i, kind) in PieceType::ALL.iter().enumerate() {
        let x = area.x + i as u16 * swatch_w;
        if x >= area.right() {
            break;
        }
        let r = Rect {
            x,
            y: area.y,
            width: swatch_w.min(area.right() - x),
            height: area.height.min(1),
        };
        let c = theme.cell_color(kind.color_id());
        Paragraph::new("██")
            .style(Style::default().fg(c).bg(theme.bg))
            .render(r, frame.buffer_mut());
    }
}

fn tab_style(current: bool, theme: &Theme) -> Style {
    if current {
        bold(Style::default().fg(theme.bg).bg(theme.title))
    } else {
        Style::default().fg(theme.main_fg)
    }
}

fn draw_menu(frame: &mut Frame, menu_state: &MenuState, hud: &Hud, theme: &Theme, area: Rect) {
    let popup = centered(area, 44, 16);
    let tab = |t: MenuTab| tab_style(menu_state.current_tab == t, theme);
    let hint = Style::default().fg(theme.inactive_fg);

    let mode_line = if menu_state.mode_locked {
        Line::from(vec![
            Span::styled(" Mode  ", tab(MenuTab::Mode)),
            Span::styled(
                format!(" {} (set by challenge) ", menu_state.mode.label()),
                Style::default().fg(theme.main_fg),
            ),
        ])
    } else {
        let mut spans = vec![Span::styled(" Mode  ", tab(MenuTab::Mode)), Span::raw(" ")];
        for mode in GameMode::ALL {
            let style = if mode == menu_state.mode {
                bold(Style::default().fg(theme.title))
            } else {
                Style::default().fg(theme.inactive_fg)
            };
            spans.push(Span::styled(format!(" {} ", mode.quota()), style));
        }
        Line::from(spans)
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " QUOTRIS ",
            bold(Style::default().fg(theme.cell_color(PieceType::Z.color_id()))),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Name  ", tab(MenuTab::Name)),
            Span::styled(
                format!(" {}_ ", menu_state.name),
                Style::default().fg(theme.main_fg),
            ),
        ]),
        Line::from(""),
        mode_line,
        Line::from(""),
        Line::from(vec![
            Span::styled(" Level ", tab(MenuTab::Level)),
            Span::styled(
                format!(" < {} / {} > ", menu_state.level, menu_state.max_level),
                Style::default().fg(theme.main_fg),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(" START ", tab(MenuTab::Start))),
        Line::from(""),
    ];
    if let Some(c) = hud.challenge {
        lines.push(Line::from(Span::styled(
            format!(" {} challenges you: {} ", c.name, format_time(c.elapsed_secs)),
            Style::default().fg(theme.title),
        )));
    }
    lines.push(Line::from(Span::styled(
        " Up/Down tab  Left/Right set  Enter ok ",
        hint,
    )));

    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, snapshot: &Snapshot, hud: &Hud, theme: &Theme, area: Rect) {
    let fg = Style::default().fg(theme.main_fg);
    let (title, title_style) = match snapshot.outcome() {
        Some(Outcome::Cleared) => (" Win! ", Style::default().fg(Color::Black).bg(Color::Green)),
        _ => (" Game Over ", Style::default().fg(Color::White).bg(Color::Red)),
    };
    let secs = hud
        .finished
        .map_or(snapshot.elapsed.as_secs_f64(), |f| f.elapsed_secs);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(title, bold(title_style))),
        Line::from(""),
        Line::from(Span::styled(format!(" Time: {} ", format_time(secs)), fg)),
        Line::from(Span::styled(
            format!(" Lines: {} ", snapshot.lines_cleared),
            fg,
        )),
    ];
    if let Some(done) = hud.finished {
        if let Some(verdict) = done.verdict_text() {
            lines.push(Line::from(Span::styled(
                format!(" {verdict} "),
                bold(Style::default().fg(theme.title)),
            )));
        }
        if let Some(code) = &done.code {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(" Challenge code: ", fg)));
            lines.push(Line::from(Span::styled(
                code.clone(),
                Style::default().fg(theme.title),
            )));
        }
        if let Some(status) = &done.delivery {
            lines.push(Line::from(Span::styled(
                status.clone(),
                Style::default().fg(theme.inactive_fg),
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " R restart   M menu   Q quit ",
        fg,
    )));

    let height = lines.len() as u16 + 2;
    let width = lines
        .iter()
        .map(|l| l.width() as u16)
        .max()
        .unwrap_or(0)
        .max(30)
        + 4;
    let popup = centered(area, width, height);
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Quotris ", Style::default().fg(theme.title))),
        )
        .render(popup, frame.buffer_mut());
}
