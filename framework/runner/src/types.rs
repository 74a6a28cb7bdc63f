/// Recommended error type for a binary's `main` function and any shared code written for runners.
/// This type is compatible with the [crate::definition::ExecuteResult] type so you can use `?` to
/// propagate errors.
pub type ThreadLabResult<T> = anyhow::Result<T>;
