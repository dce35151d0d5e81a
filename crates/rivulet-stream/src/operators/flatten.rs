use crate::event::Value;
use crate::observable::Observable;

/// Merge a stream of streams into one. Completes once the outer stream and
/// every inner stream have completed.
pub fn flatten<T: Value, E: Value>(streams: &Observable<Observable<T, E>, E>) -> Observable<T, E> {
    streams.flatten_scan((), |_, inner| (Some(()), inner))
}
