use std::path::Path;
use std::str::FromStr;

use crate::core::spans::OverlapMode;

pub fn path(rawpath: &str) -> Result<(), String> {
    let path = Path::new(&rawpath);
    if !path.exists() {
        Err(format!("{} doesn't exist or there is no permission to read it", rawpath))
    } else {
        Ok(())
    }
}

pub fn writable(_rawpath: &str) -> Result<(), String> {
    // there is no reliable pre-flight check, creation errors surface at open time
    Ok(())
}

pub fn overlap_mode(mode: &str) -> Result<(), String> {
    OverlapMode::from_str(mode).map(|_| ()).map_err(|e| e.to_string())
}

pub fn numeric<T>(low: T, upper: T) -> impl Fn(&str) -> Result<(), String>
where
    T: FromStr + std::fmt::Display + std::cmp::PartialOrd + Sized,
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    move |val: &str| -> Result<(), String> {
        let numeric = match val.parse::<T>() {
            Ok(x) => x,
            Err(_) => return Err(format!("failed to parse {}", val)),
        };
        if numeric < low || numeric > upper {
            return Err(format!("Value {} is expected to be inside [{}, {}] range", val, low, upper));
        }
        Ok(())
    }
}
