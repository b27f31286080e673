use anyhow::{bail, Context, Result};
use graphscan::{compile, file_reader, EngineError, Pattern, PatternFlags, ScanMode};
use std::io::BufRead;
use std::path::PathBuf;

/// Build a graph database from pattern list files
pub fn cmd_compile(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    case_insensitive: bool,
    dotall: bool,
    verbose: bool,
) -> Result<()> {
    let flags = PatternFlags {
        caseless: case_insensitive,
        dot_all: dotall,
    };

    let mut patterns = Vec::new();
    let mut next_id: u32 = 0;
    for input in &inputs {
        let reader = file_reader::open(input)
            .with_context(|| format!("unable to open pattern file \"{}\"", input.display()))?;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("unable to read pattern file \"{}\"", input.display()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, expression) = split_id_prefix(line).unwrap_or((next_id, line));
            next_id = next_id.max(id) + 1;

            if verbose {
                println!("  {}:{}: pattern {} = {}", input.display(), line_no + 1, id, expression);
            }
            patterns.push(Pattern::with_flags(expression, id, flags));
        }
    }

    if patterns.is_empty() {
        bail!("no patterns found in the input files");
    }

    let db = match compile(&patterns, ScanMode::Block) {
        Ok(db) => db,
        Err(EngineError::Compile(err)) => {
            // Point at the offending expression, not just its index
            let expr = patterns
                .get(err.expression)
                .map(|p| p.expression.as_str())
                .unwrap_or("?");
            bail!("unable to compile pattern \"{}\": {}", expr, err.message);
        }
        Err(err) => return Err(err).context("unable to compile pattern set"),
    };

    db.save(&output)
        .with_context(|| format!("unable to write database \"{}\"", output.display()))?;

    println!(
        "Compiled {} patterns into {} ({} bytes, {} instructions)",
        db.pattern_count(),
        output.display(),
        db.as_bytes().len(),
        db.instruction_count()
    );
    Ok(())
}

/// Parse an optional numeric "id:" prefix: `42:foo.*bar` -> (42, "foo.*bar")
fn split_id_prefix(line: &str) -> Option<(u32, &str)> {
    let (prefix, rest) = line.split_once(':')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((prefix.parse().ok()?, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_prefix_parsing() {
        assert_eq!(split_id_prefix("42:a.c"), Some((42, "a.c")));
        assert_eq!(split_id_prefix("0:x"), Some((0, "x")));
        // A colon in the expression without a numeric prefix is not an id
        assert_eq!(split_id_prefix("a:b"), None);
        assert_eq!(split_id_prefix(":ab"), None);
        assert_eq!(split_id_prefix("abc"), None);
    }
}
