//! Argument parsing for the headless binary
//!
//! Usage:
//!   shotmark displays                         List displays
//!   shotmark windows                          List capturable windows
//!   shotmark fullscreen [display]             Capture a whole display
//!   shotmark area <display> <x,y,w,h>         Capture a rectangle (display-local points, top-left origin)
//!   shotmark window <id>                      Capture one window
//!
//! Options:
//!   --out <dir>            Output directory (default from config)
//!   --annotations <file>   JSON array of annotations to flatten onto the capture
//!   --scale <factor>       Downscale output (0.1 - 1.0)
//!   --json                 Print results as JSON

use std::path::PathBuf;

use shotmark_lib::Rect;

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Displays,
    Windows,
    Fullscreen { display: usize },
    Area { display: usize, rect: Rect },
    Window { id: u32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub out: Option<PathBuf>,
    pub annotations: Option<PathBuf>,
    pub scale: Option<f32>,
    pub json: bool,
}

fn value<'a>(args: &'a [String], i: &mut usize, what: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", what))
}

pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut command: Option<CliCommand> = None;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--json" => options.json = true,
            "--out" => options.out = Some(PathBuf::from(value(args, &mut i, "--out")?)),
            "--annotations" => {
                options.annotations = Some(PathBuf::from(value(args, &mut i, "--annotations")?))
            }
            "--scale" => {
                let raw = value(args, &mut i, "--scale")?;
                let scale = raw
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid scale '{}'", raw))?;
                options.scale = Some(scale);
            }
            "displays" => command = Some(CliCommand::Displays),
            "windows" => command = Some(CliCommand::Windows),
            "fullscreen" => {
                let display = match args.get(i + 1).filter(|a| !a.starts_with('-')) {
                    Some(raw) => {
                        i += 1;
                        parse_index(raw)?
                    }
                    None => 0,
                };
                command = Some(CliCommand::Fullscreen { display });
            }
            "area" => {
                let display = parse_index(value(args, &mut i, "area")?)?;
                let rect = parse_rect(value(args, &mut i, "area")?)?;
                command = Some(CliCommand::Area { display, rect });
            }
            "window" => {
                let raw = value(args, &mut i, "window")?;
                let id = raw
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid window id '{}'", raw))?;
                command = Some(CliCommand::Window { id });
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    let command = command.ok_or_else(|| {
        "No command specified. Use: displays, windows, fullscreen, area, or window".to_string()
    })?;
    Ok((command, options))
}

fn parse_index(s: &str) -> Result<usize, String> {
    s.parse::<usize>()
        .map_err(|_| format!("Invalid display index '{}'", s))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("Invalid rectangle '{}'; expected x,y,w,h", s))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
        _ => Err(format!("Invalid rectangle '{}'; expected x,y,w,h", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_area_with_options() {
        let (cmd, opts) = parse_args(&args("area 1 100,100,200,150 --json --scale 0.5")).unwrap();
        assert_eq!(
            cmd,
            CliCommand::Area {
                display: 1,
                rect: Rect::new(100.0, 100.0, 200.0, 150.0)
            }
        );
        assert!(opts.json);
        assert_eq!(opts.scale, Some(0.5));
    }

    #[test]
    fn fullscreen_display_is_optional() {
        assert_eq!(
            parse_args(&args("fullscreen --json")).unwrap().0,
            CliCommand::Fullscreen { display: 0 }
        );
        assert_eq!(
            parse_args(&args("fullscreen 2")).unwrap().0,
            CliCommand::Fullscreen { display: 2 }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args("")).is_err());
        assert!(parse_args(&args("area 0 1,2,3")).is_err());
        assert!(parse_args(&args("window abc")).is_err());
        assert!(parse_args(&args("window")).is_err());
        assert!(parse_args(&args("bogus")).is_err());
    }
}
