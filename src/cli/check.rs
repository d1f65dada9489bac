use std::path::Path;

use super::{load_descriptors, select_descriptors, Context, LoadedDescriptor};
use crate::color::{MaybePaint, FAIL, HEADING, PASS};
use crate::evaluator::{descriptor, index};
use crate::registry::Registry;
use crate::resolver;
use crate::{error, CheckArgs};

/// Everything wrong with one descriptor. Empty means it passed.
fn problems(registry: &Registry, loaded: &LoadedDescriptor) -> Vec<String> {
    let mut problems = Vec::new();

    match &loaded.config {
        Ok(config) => {
            if let Err(err) = resolver::resolve(config, registry) {
                problems.push(err.to_string());
            }
        }
        Err(err) => problems.push(err.to_string()),
    }

    for doc in descriptor::missing_docs(&loaded.path) {
        problems.push(format!("missing {}", doc));
    }

    problems
}

/// Everything wrong with the library index.
fn index_problems(library: &Path) -> Vec<String> {
    match index::check(library) {
        Ok(problems) => problems.iter().map(|p| p.to_string()).collect(),
        Err(err) => vec![err.to_string()],
    }
}

fn label(loaded: &LoadedDescriptor) -> String {
    match &loaded.config {
        Ok(config) => config.name().to_string(),
        Err(_) => loaded.path.display().to_string(),
    }
}

pub(crate) fn check_cmd(ctx: &Context, args: &CheckArgs) -> bool {
    let paths = match select_descriptors(ctx, &args.evaluators) {
        Ok(paths) => paths,
        Err(err) => {
            error!("{}", err);
            return false;
        }
    };

    if paths.is_empty() {
        error!("no evaluators found");
        return false;
    }

    let mut failed = 0;
    let loaded = load_descriptors(paths);

    for entry in &loaded {
        let problems = problems(&ctx.registry, entry);

        if problems.is_empty() {
            let description = entry
                .config
                .as_ref()
                .map(|config| config.description())
                .unwrap_or_default();

            println!("{} {}: {}", PASS.maybe_paint("ok"), label(entry), description);
        } else {
            failed += 1;

            println!("{} {}", FAIL.maybe_paint("FAIL"), label(entry));

            for problem in problems {
                println!("    {}", problem);
            }
        }
    }

    // the index describes the whole library, so it is only checked when nothing was selected
    let index_ok = if args.evaluators.is_empty() {
        let problems = index_problems(&ctx.config.evaluators_dir());

        if problems.is_empty() {
            println!("{} {}", PASS.maybe_paint("ok"), index::INDEX_FILE);
        } else {
            println!("{} {}", FAIL.maybe_paint("FAIL"), index::INDEX_FILE);

            for problem in &problems {
                println!("    {}", problem);
            }
        }

        problems.is_empty()
    } else {
        true
    };

    println!();

    let summary = format!(
        "{} checked, {} passed, {} failed",
        loaded.len(),
        loaded.len() - failed,
        failed
    );

    println!("{}", HEADING.maybe_paint(summary));

    failed == 0 && index_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::catalog::tests::claude_registry;
    use std::fs;
    use std::path::PathBuf;

    fn write_evaluator(root: &Path, name: &str, tier: &str, docs: bool) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();

        let path = dir.join(descriptor::DESCRIPTOR_FILE);
        fs::write(
            &path,
            format!(
                "name: {}\ndescription: d\napi_key_env: K\nprompt: \"{{content}}\"\noutput_suffix: S\nmodel_requirement:\n  family: claude\n  tier: {}\n",
                name, tier
            ),
        )
        .unwrap();

        if docs {
            fs::write(dir.join("README.md"), "# readme\n").unwrap();
            fs::write(dir.join("CHANGELOG.md"), "# changelog\n").unwrap();
        }

        path
    }

    #[test]
    fn test_complete_evaluator_passes() {
        let root = tempfile::tempdir().unwrap();
        let path = write_evaluator(root.path(), "quick", "haiku", true);

        let loaded = load_descriptors(vec![path]);

        assert!(problems(&claude_registry(), &loaded[0]).is_empty());
        assert_eq!(label(&loaded[0]), "quick");
    }

    #[test]
    fn test_problems_are_collected() {
        let root = tempfile::tempdir().unwrap();
        let path = write_evaluator(root.path(), "broken", "mythos", false);

        let loaded = load_descriptors(vec![path]);
        let problems = problems(&claude_registry(), &loaded[0]);

        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("mythos"));
        assert_eq!(problems[1], "missing README.md");
        assert_eq!(problems[2], "missing CHANGELOG.md");
    }

    #[test]
    fn test_index_problems() {
        let root = tempfile::tempdir().unwrap();
        write_evaluator(root.path(), "quick", "haiku", true);

        assert!(index_problems(root.path())[0].contains("failed to read index"));

        fs::write(
            root.path().join(index::INDEX_FILE),
            r#"{"evaluators": [{"path": "gone/evaluator.yml"}], "categories": {}, "providers": {}}"#,
        )
        .unwrap();

        assert_eq!(
            index_problems(root.path()),
            [
                "quick/evaluator.yml is not listed in index.json",
                "index.json lists gone/evaluator.yml, which does not exist",
            ]
        );

        fs::write(
            root.path().join(index::INDEX_FILE),
            r#"{"evaluators": [{"path": "quick/evaluator.yml"}], "categories": {}, "providers": {}}"#,
        )
        .unwrap();

        assert!(index_problems(root.path()).is_empty());
    }
}
