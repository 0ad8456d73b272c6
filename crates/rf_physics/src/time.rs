// crates/rf_physics/src/time.rs

//! 模拟时间管理
//!
//! 外层步开始时计算 `next = current + dt` 并递增步数；物理计算、输出与
//! 重启判断都基于 `next`；外层步结束时 `current = next`。

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use rf_config::TimeConfig;

/// 模拟时间管理器
#[derive(Debug, Clone)]
pub struct TimeManager {
    start: NaiveDateTime,
    dt: Duration,
    kstep: u64,
    nsteps: u64,
    current: NaiveDateTime,
    next: NaiveDateTime,
}

impl TimeManager {
    /// 由时间配置创建
    pub fn new(config: &TimeConfig) -> Self {
        let dt = Duration::seconds(config.dt_seconds());
        Self {
            start: config.start,
            dt,
            kstep: 0,
            nsteps: config.total_steps(),
            current: config.start,
            next: config.start,
        }
    }

    /// 进入下一外层步
    pub fn advance(&mut self) {
        self.kstep += 1;
        self.next = self.current + self.dt;
    }

    /// 外层步结束，提交时间
    pub fn commit(&mut self) {
        self.current = self.next;
    }

    /// 当前时间（外层步开始时刻）
    pub fn current(&self) -> NaiveDateTime {
        self.current
    }

    /// 外层步结束时刻
    pub fn next(&self) -> NaiveDateTime {
        self.next
    }

    /// 起始时间
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// 已完成或正在进行的外层步数
    pub fn kstep(&self) -> u64 {
        self.kstep
    }

    /// 总外层步数
    pub fn nsteps(&self) -> u64 {
        self.nsteps
    }

    /// 是否已完成全部外层步
    pub fn is_finished(&self) -> bool {
        self.kstep >= self.nsteps
    }

    /// 当前时间距起点的秒数
    pub fn elapsed_seconds(&self) -> i64 {
        (self.current - self.start).num_seconds()
    }

    /// 外层步结束时是否需要输出
    pub fn output_due(&self, interval_hours: u32) -> bool {
        interval_hours > 0 && self.next.hour() % interval_hours == 0 && self.next.minute() == 0
    }

    /// 外层步结束时是否需要写重启文件
    ///
    /// `interval_hours`：0 仅在最后一步，1..=24 按小时，30 每月 1 日零时。
    pub fn restart_due(&self, interval_hours: u32) -> bool {
        if self.kstep == self.nsteps {
            return true;
        }
        let at_minute_zero = self.next.minute() == 0;
        match interval_hours {
            1..=24 => at_minute_zero && self.next.hour() % interval_hours == 0,
            30 => at_minute_zero && self.next.day() == 1 && self.next.hour() == 0,
            _ => false,
        }
    }
}
