//! Request timing and access logging.

use super::{Request, Response};
use crate::log;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Timer {
    depth: u32,
    started: Option<Instant>,
    total: Duration,
}

/// Named, re-entrant timers accumulated over one request.
///
/// Nested `start`/`stop` pairs on the same name only measure the outermost
/// span.
#[derive(Debug, Default)]
pub struct EventTimer {
    timers: Vec<(String, Timer)>,
}

impl EventTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str) {
        let timer = match self.timers.iter_mut().position(|(n, _)| n == name) {
            Some(idx) => &mut self.timers[idx].1,
            None => {
                self.timers.push((name.to_string(), Timer::default()));
                let last = self.timers.len() - 1;
                &mut self.timers[last].1
            }
        };
        if timer.depth == 0 {
            timer.started = Some(Instant::now());
        }
        timer.depth += 1;
    }

    pub fn stop(&mut self, name: &str) {
        let Some((_, timer)) = self.timers.iter_mut().find(|(n, _)| n == name) else {
            return;
        };
        if timer.depth == 0 {
            return;
        }
        timer.depth -= 1;
        if timer.depth == 0
            && let Some(started) = timer.started.take()
        {
            timer.total += started.elapsed();
        }
    }

    /// Accumulated time for `name`, excluding a still-running span.
    pub fn total(&self, name: &str) -> Option<Duration> {
        self.timers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.total)
    }

    /// `<name>=<ms>ms` pairs for every timer that recorded time.
    pub fn summary(&self) -> String {
        self.timers
            .iter()
            .filter(|(_, t)| !t.total.is_zero())
            .map(|(n, t)| format!("{}={}", n, format_ms(t.total)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Client address: first `X-Forwarded-For` entry, else the socket peer.
pub fn client_ip(request: &Request, remote: Option<&str>) -> String {
    request
        .header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| remote.map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}

/// `<ip> <method> <path> <status> <ms>ms [timers]`
pub fn access_line(
    request: &Request,
    response: &Response,
    remote: Option<&str>,
    elapsed: Duration,
    timer: &EventTimer,
) -> String {
    let mut line = format!(
        "{} {} {} {} {}",
        client_ip(request, remote),
        request.method().as_str(),
        request.path(),
        response.status(),
        format_ms(elapsed)
    );
    let timings = timer.summary();
    if !timings.is_empty() {
        line.push(' ');
        line.push_str(&timings);
    }
    line
}

pub fn log_access(
    request: &Request,
    response: &Response,
    remote: Option<&str>,
    elapsed: Duration,
    timer: &EventTimer,
) {
    log!("access"; "{}", access_line(request, response, remote, elapsed, timer));
}

fn format_ms(d: Duration) -> String {
    format!("{:.3}ms", d.as_secs_f64() * 1e3)
}
