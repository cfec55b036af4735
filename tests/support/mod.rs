#![allow(dead_code)]

pub mod env;
pub mod wav;

/// A config small enough for CPU tests: 48 CQT bins at 4 kHz, 1.2 s shingles.
pub const SMALL_CONFIG_TOML: &str = r#"
sample_rate = 4000
zdim = 8
ncha_in = 2

[shingling]
len = 1.2
hop = 0.6

[cqt]
noctaves = 4
nbinsoct = 12
hoplen = 0.005
fmin = 100.0

[cqt.pool]
len = 1
hop = 1
"#;
