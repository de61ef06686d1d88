//! 재접속 정책
//!
//! 대상 측 연결 관리자에 주입된다. 기본은 무제한 고정 대기(2초).
//! 정책 자체는 시계에 의존하지 않으므로 대기 시간 계산만 따로 테스트할 수 있다.

use std::time::Duration;

use rand::Rng;

/// 재시도 정책
pub trait RetryPolicy: Send + Sync {
    /// `attempt`번째 시도(1부터)가 실패한 뒤 기다릴 시간
    ///
    /// `None`이면 더 이상 시도하지 않는다.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// 한 번 성공한 뒤 상태 초기화
    fn reset(&mut self) {}
}

/// 고정 간격 재시도
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// 무제한 재시도
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// 최대 시도 횟수 제한
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// 지수 백오프 (지터 포함)
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    /// 지연 시간 대비 최대 지터 비율 (0.0 ~ 1.0)
    jitter: f64,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            jitter: 0.25,
            max_attempts: None,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// 지터 없는 기본 지연
    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let base = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return Some(base);
        }

        let spread = base.as_secs_f64() * self.jitter;
        let offset = rand::thread_rng().gen_range(0.0..=spread);
        Some(Duration::from_secs_f64(base.as_secs_f64() + offset).min(self.max))
    }
}
