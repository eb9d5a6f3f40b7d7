/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `login` — browser-based PKCE login and saved-tracks fetch

Handlers are intentionally small and use the library components: the
authorization flow, the HTTP clients, and the configuration layer.
*/

pub mod login;
