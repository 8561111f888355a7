/// Worker thread configuration. `threads == 0` means one per available core.
#[derive(Debug, Clone, Copy)]
pub struct ThreadConfig {
    pub threads: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

impl ThreadConfig {
    /// Number of worker threads to spawn.
    pub fn resolve(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_threads() {
        assert_eq!(ThreadConfig { threads: 3 }.resolve(), 3);
        assert!(ThreadConfig { threads: 0 }.resolve() >= 1);
        assert_eq!(ThreadConfig::default().resolve(), 1);
    }
}
