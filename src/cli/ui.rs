use dbmigrate::{Driver, MigrateError, MigrationStore, PatchCatalog, PatchRef, ScriptExecutor};

pub fn print_status<S: MigrationStore + ScriptExecutor>(driver: &Driver<'_, S>) -> dbmigrate::Result<()> {
    for line in status_lines(driver)? {
        println!("{}", line);
    }
    Ok(())
}

fn status_lines<S: MigrationStore + ScriptExecutor>(driver: &Driver<'_, S>) -> dbmigrate::Result<Vec<String>> {
    let catalog = driver.catalog();

    let mut lines = vec!["Currently applied patches:".to_string()];
    lines.extend(list_lines(catalog, &driver.applied_patches()?));
    lines.push(String::new());
    lines.push("Currently unapplied patches:".to_string());
    lines.extend(list_lines(catalog, &driver.unapplied_patches()?));
    Ok(lines)
}

fn list_lines(catalog: &PatchCatalog, patches: &[PatchRef]) -> Vec<String> {
    if patches.is_empty() {
        return vec!["  None.".to_string()];
    }
    patches
        .iter()
        .map(|patch| match patch {
            PatchRef::Known(_) => format!("  * {}", catalog.name_of(patch)),
            PatchRef::Ghost(name) => format!("  ! {} (unknown origin)", name),
        })
        .collect()
}

/// Prints patch names one per line, sorted.
pub fn print_names(catalog: &PatchCatalog, patches: &[PatchRef]) {
    let mut names = catalog.names(patches);
    names.sort();
    for name in names {
        println!("{}", name);
    }
}

pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<MigrateError>() {
        Some(failure @ MigrateError::PatchApplicationFailed { .. }) => {
            eprintln!("error: {}", failure);
            for line in failure.details() {
                eprintln!("error: details: {}", line);
            }
            eprintln!("notice: all changes to the database were rolled back");
        }
        _ => eprintln!("error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmigrate::{Patch, SqliteStore};
    use rusqlite::Connection;

    #[test]
    fn test_status_lines() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut catalog = PatchCatalog::new().with_name("shop");
        catalog.add_patch(Patch::new("customers"));
        catalog.add_patch(Patch::new("orders").depends_on("customers"));
        catalog.resolve().unwrap();

        let tx = conn.transaction().unwrap();
        let driver = Driver::new(SqliteStore::new(&tx), &catalog, "shop").unwrap();
        driver.init(None).unwrap();
        driver.upgrade(&catalog.lookup(&["customers"]).unwrap(), true).unwrap();
        let target = driver.store().find_target("shop").unwrap().unwrap();
        driver.store().insert_applied(target, "retired").unwrap();

        assert_eq!(
            status_lines(&driver).unwrap(),
            vec![
                "Currently applied patches:",
                "  * customers",
                "  ! retired (unknown origin)",
                "",
                "Currently unapplied patches:",
                "  * orders",
            ]
        );
    }
}
