//! `codeweave tools`: List the tool catalog.

use codeweave_tools::CATALOG;

pub fn run() {
    println!("Tools available to the model");
    println!("============================");
    println!();
    for spec in CATALOG {
        let kind = if spec.read_only { "read-only" } else { "mutating " };
        println!("  {:<22} {kind}  {}", spec.name, spec.description);
    }
    println!();
    println!("  Read-only calls in one turn run concurrently; mutating calls run one at a time.");
    println!("  Mutating calls never touch protected paths (.env, keys, lockfiles, .git/, ...).");
}
