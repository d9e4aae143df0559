/// What kind of binary a file is.
///
/// Every recognized file is either the thing being run or something it links
/// against; finer ELF distinctions (relocatable objects, core dumps) are
/// folded into [`Library`](Self::Library).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BinaryKind {
    /// A program entry point.
    Executable,
    /// A shared library.
    Library,
}

impl BinaryKind {
    /// Returns `true` for executables.
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::Executable)
    }
}
