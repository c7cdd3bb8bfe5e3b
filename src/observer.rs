use crate::errors::SharedError;

/// Receiver of the notifications an observable pushes: any number of `next`
/// calls followed by at most one `error` or `complete`.
pub trait Observer {
    type NextFnType;

    fn next(&mut self, _: Self::NextFnType);
    fn complete(&mut self);
    fn error(&mut self, _: SharedError);
}
