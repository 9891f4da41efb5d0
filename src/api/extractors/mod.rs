/*!
 * Request extractors
 *
 * Public API:
 * - Caller: the `CallerIdentity` attached by the access middleware
 */

mod caller;

pub use caller::Caller;
