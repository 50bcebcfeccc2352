#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    NotADirectory,
    DirectoryNotEmpty,
    DirectoryFull,
    NameTooLong,
    NoSpace,
}
