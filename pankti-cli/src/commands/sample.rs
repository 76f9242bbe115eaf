//! Sample command - prints the playground's starter program.

use crate::editor::SAMPLE_PROGRAM;

pub fn print_sample() {
    print!("{}", SAMPLE_PROGRAM);
}
