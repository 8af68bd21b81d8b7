mod closure;
mod workspace_lookup;
