#[cfg(test)]
mod test {
    use assert_cmd::prelude::*;
    use predicates::prelude::*;
    use std::process::Command;

    #[test]
    fn unknown_flag_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("keyquarryd")?;

        cmd.arg("--not-a-real-flag");
        cmd.assert().failure().stderr(predicate::str::contains("unexpected"));

        Ok(())
    }

    #[test]
    fn non_interactive_query_sets_and_gets_a_key() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("keyquarryd")?;

        cmd.arg("--non-interactive")
            .arg("--query=SET greeting hello\nGET greeting");
        cmd.assert().success().stderr(predicate::str::contains("hello"));

        Ok(())
    }

    #[test]
    fn non_interactive_get_of_missing_key_reports_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("keyquarryd")?;

        cmd.arg("--non-interactive").arg("--query=GET nonexistent_key");
        cmd.assert().success().stderr(predicate::str::contains("N/A"));

        Ok(())
    }
}
