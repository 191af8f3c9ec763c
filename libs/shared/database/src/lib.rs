pub mod supabase;

pub use supabase::{return_representation, SupabaseClient, SupabaseError};
