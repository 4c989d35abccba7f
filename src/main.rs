mod launch;

use launch::RootCommand;

fn main() {
    let opts: RootCommand = argh::from_env();

    if let Err(code) = opts.run() {
        std::process::exit(code);
    }
}
