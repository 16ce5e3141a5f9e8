use crossterm::style::Stylize;
use unicode_width::UnicodeWidthChar;

const DESCRIPTION_COLS: usize = 56;

/// Snapshot of one task row for display.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub id: String,
    pub description: String,
    pub agent: String,
    pub status: &'static str,
}

/// The live-progress contract the orchestrator reports into. Anything that
/// can show log lines and a task board qualifies.
pub trait Dashboard: Send + Sync {
    fn add_log(&self, message: &str, agent: &str);
    fn update_tasks(&self, tasks: &[TaskView]);
}

/// Timestamped, color-coded console lines plus a compact task board.
pub struct ConsoleDashboard;

impl Dashboard for ConsoleDashboard {
    fn add_log(&self, message: &str, agent: &str) {
        let ts = chrono::Local::now().format("%H:%M:%S");
        let line = format!("[{ts}] [{agent}] {message}");
        let styled = match agent {
            "System" => line.dark_grey(),
            "Planner" => line.yellow(),
            "Tool" => line.cyan(),
            "Source" => line.bold(),
            "Error" => line.red(),
            _ => line.white(),
        };
        println!("{styled}");
    }

    fn update_tasks(&self, tasks: &[TaskView]) {
        for task in tasks {
            let marker = match task.status {
                "RUNNING" => "▶".cyan(),
                "COMPLETED" => "✓".green(),
                "FAILED" => "✗".red(),
                _ => "·".dark_grey(),
            };
            println!(
                "  {marker} {} [{}] {}",
                task.id,
                task.agent,
                truncate_display(&task.description, DESCRIPTION_COLS)
            );
        }
    }
}

/// Silent sink for headless runs and tests.
pub struct NullDashboard;

impl Dashboard for NullDashboard {
    fn add_log(&self, _message: &str, _agent: &str) {}
    fn update_tasks(&self, _tasks: &[TaskView]) {}
}

/// Truncates to a display-column budget (CJK chars are two columns wide).
fn truncate_display(s: &str, max_cols: usize) -> String {
    let mut cols = 0usize;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if cols + w > max_cols {
            out.push('…');
            break;
        }
        cols += w;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_display;

    #[test]
    fn wide_chars_count_double() {
        // Five Hangul syllables are ten columns; only four fit in eight.
        assert_eq!(truncate_display("안녕하세요", 8), "안녕하세…");
        assert_eq!(truncate_display("abc", 10), "abc");
    }
}
