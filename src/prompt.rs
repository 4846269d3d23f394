/// Asks the operator a yes/no question before a real run mutates anything.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, question: &str) -> bool {
        self(question)
    }
}

/// Answers yes without asking, for `--yes` and tests.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> bool {
        true
    }
}

/// Always declines.
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, _question: &str) -> bool {
        false
    }
}
